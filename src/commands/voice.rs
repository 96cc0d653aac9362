//! Voice control commands.

use super::{CommandRegistry, handler};
use crate::voice::VoiceHandler;
use std::sync::Arc;

/// Register `listen`, `stop listening` and `speak`.
pub fn register(registry: &mut CommandRegistry, voice: Arc<VoiceHandler>) {
    let listen = Arc::clone(&voice);
    registry.register("listen", handler(move |_| Ok(listen.start_listening())));

    let stop = Arc::clone(&voice);
    registry.register(
        "stop listening",
        handler(move |_| Ok(stop.stop_listening())),
    );

    registry.register("speak", handler(move |text| Ok(voice.speak_command(text))));
    tracing::info!("voice commands registered");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::VoiceConfig;
    use crate::voice::{NOT_LISTENING, VOICE_UNAVAILABLE};
    use tokio::sync::mpsc;

    #[test]
    fn commands_report_disabled_voice() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let voice = Arc::new(VoiceHandler::new(VoiceConfig::default(), None, None, tx));
        let mut registry = CommandRegistry::new();
        register(&mut registry, voice);

        assert_eq!(registry.sorted_names(), ["listen", "speak", "stop listening"]);
        for name in ["listen", "stop listening", "speak"] {
            let run = registry.lookup(name).unwrap();
            assert_eq!(run("hello").unwrap(), VOICE_UNAVAILABLE);
        }
    }

    #[cfg(unix)]
    #[test]
    fn stop_without_listener() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = VoiceConfig {
            tts_command: Some(vec!["true".to_owned()]),
            ..VoiceConfig::default()
        };
        let voice = Arc::new(VoiceHandler::from_config(&config, tx));
        let mut registry = CommandRegistry::new();
        register(&mut registry, voice);

        let stop = registry.lookup("stop listening").unwrap();
        assert_eq!(stop("").unwrap(), NOT_LISTENING);
        let speak = registry.lookup("speak").unwrap();
        assert_eq!(speak("hello there").unwrap(), "Said: hello there");
    }
}
