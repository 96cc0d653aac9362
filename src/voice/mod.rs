//! Voice input and output.
//!
//! Speech capture and synthesis are external collaborators reached through
//! the [`SpeechRecognizer`] and [`SpeechSynthesizer`] traits. This module owns
//! the listening worker: a background thread that waits for the wake word,
//! captures the following command and pushes it onto the session's input
//! channel as an [`InputEvent::Spoken`]. The worker never calls the
//! dispatcher itself, and it does not capture again until the session has
//! finished speaking the reply.

mod external;

pub use external::{CommandRecognizer, CommandSynthesizer};

use crate::config::{VoiceConfig, secs};
use crate::error::{AssistantError, Result};
use crate::session::{InputEvent, SpokenCommand};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reply when no speech synthesizer is configured.
pub const VOICE_UNAVAILABLE: &str = "Voice features are not available";
/// Reply to `listen` when no speech recognizer is configured.
pub const RECOGNITION_UNAVAILABLE: &str = "Voice recognition is not available";
pub const ALREADY_LISTENING: &str = "Already listening";
pub const LISTENING_STOPPED: &str = "Voice recognition deactivated";
pub const NOT_LISTENING: &str = "Not currently listening";
/// Spoken after the wake word is recognized.
pub const WAKE_ACKNOWLEDGEMENT: &str = "Yes?";
pub const NO_COMMAND_HEARD: &str = "I didn't hear a command";
/// Spoken when a voice command produced an empty reply.
pub const COMMAND_NOT_UNDERSTOOD: &str = "I didn't understand that command";

/// How often a waiting listener checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Speech-to-text capture.
pub trait SpeechRecognizer: Send {
    /// Sample ambient noise for `duration` to adjust the energy threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if the input device fails.
    fn calibrate(&mut self, duration: Duration) -> Result<()>;

    /// Capture one phrase and return its transcript.
    ///
    /// Waits up to `timeout` for speech to start and records at most
    /// `phrase_limit`. Returns `Ok(None)` when nothing intelligible was heard.
    ///
    /// # Errors
    ///
    /// Returns an error if capture or recognition fails.
    fn transcribe(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Option<String>>;
}

/// Text-to-speech output.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, blocking until playback has finished.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis or playback fails.
    fn speak(&self, text: &str) -> Result<()>;
}

struct ListenWorker {
    cancel: CancellationToken,
    handle: JoinHandle<Box<dyn SpeechRecognizer>>,
}

/// Owns the speech collaborators and the optional listening worker.
pub struct VoiceHandler {
    config: VoiceConfig,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    recognizer: Mutex<Option<Box<dyn SpeechRecognizer>>>,
    worker: Mutex<Option<ListenWorker>>,
    events: UnboundedSender<InputEvent>,
}

impl VoiceHandler {
    /// Create a handler. Voice is enabled only when a synthesizer is given;
    /// listening additionally needs a recognizer.
    pub fn new(
        config: VoiceConfig,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        events: UnboundedSender<InputEvent>,
    ) -> Self {
        if synthesizer.is_some() {
            info!(recognition = recognizer.is_some(), "voice handler initialized");
        } else {
            info!("no speech synthesizer configured, voice features disabled");
        }
        Self {
            config,
            synthesizer,
            recognizer: Mutex::new(recognizer),
            worker: Mutex::new(None),
            events,
        }
    }

    /// Build the handler from the external programs named in config.
    ///
    /// A malformed command line disables that collaborator rather than
    /// failing start-up.
    pub fn from_config(config: &VoiceConfig, events: UnboundedSender<InputEvent>) -> Self {
        let synthesizer = config.tts_command.as_deref().and_then(|argv| {
            CommandSynthesizer::new(argv)
                .map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>)
                .map_err(|e| error!("failed to initialize speech synthesizer: {e}"))
                .ok()
        });
        let recognizer = config.stt_command.as_deref().and_then(|argv| {
            CommandRecognizer::new(argv)
                .map(|r| Box::new(r) as Box<dyn SpeechRecognizer>)
                .map_err(|e| error!("failed to initialize speech recognizer: {e}"))
                .ok()
        });
        Self::new(config.clone(), synthesizer, recognizer, events)
    }

    /// Whether voice output is available.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Whether the listening worker is running.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Speak `text` aloud.
    ///
    /// # Errors
    ///
    /// Returns an error if voice is disabled or playback fails.
    pub fn speak(&self, text: &str) -> Result<()> {
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or_else(|| AssistantError::Voice(VOICE_UNAVAILABLE.to_owned()))?;
        debug!(text, "speaking");
        synthesizer.speak(text)
    }

    /// Handler body for `speak <text>`.
    pub fn speak_command(&self, text: &str) -> String {
        if !self.is_enabled() {
            return VOICE_UNAVAILABLE.to_owned();
        }
        match self.speak(text) {
            Ok(()) => format!("Said: {text}"),
            Err(e) => {
                error!("TTS error: {e}");
                format!("Error speaking: {e}")
            }
        }
    }

    /// Speak the reply to a voice command, or a fallback when it is empty.
    pub fn speak_reply(&self, reply: &str) {
        let text = if reply.trim().is_empty() {
            warn!("no response from command processing");
            COMMAND_NOT_UNDERSTOOD
        } else {
            reply
        };
        if let Err(e) = self.speak(text) {
            warn!("failed to speak reply: {e}");
        }
    }

    /// Start the background listening worker.
    pub fn start_listening(&self) -> String {
        let Some(synthesizer) = self.synthesizer.clone() else {
            return VOICE_UNAVAILABLE.to_owned();
        };

        let mut worker = lock(&self.worker);
        if let Some(existing) = worker.as_ref() {
            if !existing.handle.is_finished() {
                return ALREADY_LISTENING.to_owned();
            }
            if let Some(finished) = worker.take() {
                self.reclaim(finished);
            }
        }

        let Some(recognizer) = lock(&self.recognizer).take() else {
            return RECOGNITION_UNAVAILABLE.to_owned();
        };

        let cancel = CancellationToken::new();
        let listen_loop = ListenLoop {
            config: self.config.clone(),
            synthesizer,
            events: self.events.clone(),
            cancel: cancel.clone(),
        };
        let spawn_res = std::thread::Builder::new()
            .name("jarvis-listener".to_owned())
            .spawn(move || listen_loop.run(recognizer));

        match spawn_res {
            Ok(handle) => {
                *worker = Some(ListenWorker { cancel, handle });
                format!(
                    "Voice recognition activated. Say '{}' to begin.",
                    capitalize(&self.config.wake_word)
                )
            }
            Err(e) => {
                error!("failed to spawn listener thread: {e}");
                "I couldn't start voice recognition.".to_owned()
            }
        }
    }

    /// Stop the listening worker and wait for it to exit.
    pub fn stop_listening(&self) -> String {
        if !self.is_enabled() {
            return VOICE_UNAVAILABLE.to_owned();
        }
        let Some(worker) = lock(&self.worker).take() else {
            return NOT_LISTENING.to_owned();
        };
        worker.cancel.cancel();
        self.reclaim(worker);
        LISTENING_STOPPED.to_owned()
    }

    fn reclaim(&self, worker: ListenWorker) {
        match worker.handle.join() {
            Ok(recognizer) => *lock(&self.recognizer) = Some(recognizer),
            Err(_) => error!("listener thread panicked; voice recognition disabled"),
        }
    }
}

impl Drop for VoiceHandler {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.cancel.cancel();
        }
    }
}

/// State moved onto the listener thread.
struct ListenLoop {
    config: VoiceConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    events: UnboundedSender<InputEvent>,
    cancel: CancellationToken,
}

impl ListenLoop {
    fn run(self, mut recognizer: Box<dyn SpeechRecognizer>) -> Box<dyn SpeechRecognizer> {
        info!("starting voice recognition loop");
        if let Err(e) = recognizer.calibrate(secs(self.config.initial_calibration_secs)) {
            warn!("initial ambient noise calibration failed: {e}");
        }

        while !self.cancel.is_cancelled() && !self.events.is_closed() {
            if let Err(e) = self.listen_once(recognizer.as_mut()) {
                error!("error in listen loop: {e}");
                self.pause(secs(self.config.error_backoff_secs));
            }
        }

        info!("voice recognition loop stopped");
        recognizer
    }

    /// One wake-word cycle.
    fn listen_once(&self, recognizer: &mut dyn SpeechRecognizer) -> Result<()> {
        let heard = recognizer.transcribe(
            secs(self.config.wake_timeout_secs),
            secs(self.config.wake_phrase_limit_secs),
        )?;
        let Some(heard) = heard else {
            return Ok(());
        };
        debug!(heard = %heard, "heard phrase");
        if !contains_wake_word(&heard, &self.config.wake_word) {
            return Ok(());
        }

        info!("wake word detected");
        self.say(WAKE_ACKNOWLEDGEMENT);
        self.pause(secs(self.config.settle_delay_secs));
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        recognizer.calibrate(secs(self.config.command_calibration_secs))?;
        let command = recognizer.transcribe(
            secs(self.config.command_timeout_secs),
            secs(self.config.command_phrase_limit_secs),
        )?;

        match command.map(|c| c.trim().to_lowercase()) {
            Some(command) if !command.is_empty() => {
                info!(command = %command, "voice command recognized");
                let (spoken, replied) = SpokenCommand::new(command);
                self.events
                    .send(InputEvent::Spoken(spoken))
                    .map_err(|_| AssistantError::Channel("input channel closed".to_owned()))?;
                self.wait_for_reply(replied);
                self.pause(secs(self.config.settle_delay_secs));
            }
            _ => {
                warn!("no command detected");
                self.say(NO_COMMAND_HEARD);
            }
        }
        Ok(())
    }

    fn say(&self, text: &str) {
        if let Err(e) = self.synthesizer.speak(text) {
            warn!("failed to speak {text:?}: {e}");
        }
    }

    /// Block until the session has delivered the reply to a spoken command.
    fn wait_for_reply(&self, mut replied: oneshot::Receiver<()>) {
        while !self.cancel.is_cancelled() {
            match replied.try_recv() {
                Err(oneshot::error::TryRecvError::Empty) => std::thread::sleep(POLL_INTERVAL),
                _ => return,
            }
        }
    }

    /// Sleep for `duration`, waking early when cancelled.
    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= deadline || self.cancel.is_cancelled() {
                return;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Case-insensitive containment check for the wake word.
#[must_use]
pub fn contains_wake_word(heard: &str, wake_word: &str) -> bool {
    let wake_word = wake_word.trim().to_lowercase();
    !wake_word.is_empty() && heard.to_lowercase().contains(&wake_word)
}

/// Capitalize the first character of a string.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => {
            let mut result = c.to_uppercase().to_string();
            result.push_str(chars.as_str());
            result
        }
        None => String::new(),
    }
}
