//! Interactive session loop.
//!
//! The input sources (the stdin reader and the voice listener) send
//! [`InputEvent`]s into one channel. [`Session::run`] is the single consumer:
//! it drains the channel and calls the dispatcher, so turns are processed one
//! at a time no matter where they came from. Interrupts bypass the channel
//! through a [`CancellationToken`] and end the session even mid-turn.

use crate::dispatcher::Dispatcher;
use crate::error::{AssistantError, Result};
use crate::voice::VoiceHandler;
use std::future::Future;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Printed when the session ends.
pub const FAREWELL: &str = "Goodbye!";

/// Something for the session to handle.
#[derive(Debug)]
pub enum InputEvent {
    /// A line typed at the prompt.
    Typed(String),
    /// A command recognized by the voice listener.
    Spoken(SpokenCommand),
    /// The typed input stream ended.
    Closed,
}

/// A voice command plus the channel that tells the listener its reply has
/// been delivered.
///
/// The listener does not capture again until [`SpokenCommand::finish`] is
/// called or the command is dropped.
#[derive(Debug)]
pub struct SpokenCommand {
    pub text: String,
    replied: oneshot::Sender<()>,
}

impl SpokenCommand {
    pub fn new(text: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (replied, rx) = oneshot::channel();
        (
            Self {
                text: text.into(),
                replied,
            },
            rx,
        )
    }

    /// Signal that the reply has been shown and spoken.
    pub fn finish(self) {
        let _ = self.replied.send(());
    }
}

/// Why the session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `exit`.
    Exit,
    /// Ctrl+C.
    Interrupted,
    /// End of input, or every sender went away.
    Closed,
}

/// The read-evaluate-print loop.
pub struct Session<W> {
    dispatcher: Arc<Dispatcher>,
    voice: Option<Arc<VoiceHandler>>,
    display_name: String,
    cancel: CancellationToken,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(dispatcher: Arc<Dispatcher>, display_name: impl Into<String>, out: W) -> Self {
        Self {
            dispatcher,
            voice: None,
            display_name: display_name.into(),
            cancel: CancellationToken::new(),
            out,
        }
    }

    /// Speak replies to voice commands through `voice`.
    #[must_use]
    pub fn with_voice(mut self, voice: Arc<VoiceHandler>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Token that interrupts the session when cancelled.
    pub fn interrupt_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Print the banner listing available commands.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the output fails.
    pub fn print_banner(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "{} initialized. Type 'exit' to quit.",
            self.display_name
        )?;
        let names = self.dispatcher.registry().sorted_names();
        if names.is_empty() {
            writeln!(self.out, "Warning: No commands were loaded!")?;
        } else {
            writeln!(self.out, "Available commands: {}", names.join(", "))?;
        }
        Ok(())
    }

    /// Consume events until the user exits, interrupts, or input ends.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing to the output fails.
    pub async fn run(&mut self, events: &mut UnboundedReceiver<InputEvent>) -> Result<SessionEnd> {
        self.prompt()?;
        loop {
            let Some(event) = self.until_interrupted(events.recv()).await else {
                return self.interrupted();
            };
            match event {
                Some(InputEvent::Typed(line)) => {
                    let line = line.trim();
                    if line.eq_ignore_ascii_case("exit") {
                        writeln!(self.out, "{FAREWELL}")?;
                        return Ok(SessionEnd::Exit);
                    }
                    if !line.is_empty() {
                        let Some(reply) = self
                            .until_interrupted(self.dispatcher.process(line))
                            .await
                        else {
                            return self.interrupted();
                        };
                        self.show_reply(&reply)?;
                    }
                    self.prompt()?;
                }
                Some(InputEvent::Spoken(spoken)) => {
                    writeln!(self.out, "\n[voice] You: {}", spoken.text)?;
                    let Some(reply) = self
                        .until_interrupted(self.dispatcher.process(&spoken.text))
                        .await
                    else {
                        return self.interrupted();
                    };
                    self.show_reply(&reply)?;
                    if self.until_interrupted(self.speak(reply)).await.is_none() {
                        return self.interrupted();
                    }
                    spoken.finish();
                    self.prompt()?;
                }
                Some(InputEvent::Closed) | None => {
                    writeln!(self.out, "\n{FAREWELL}")?;
                    return Ok(SessionEnd::Closed);
                }
            }
        }
    }

    /// Drive `fut` unless the session is interrupted first.
    async fn until_interrupted<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }

    fn interrupted(&mut self) -> Result<SessionEnd> {
        writeln!(self.out, "\n{FAREWELL}")?;
        Ok(SessionEnd::Interrupted)
    }

    fn prompt(&mut self) -> Result<()> {
        write!(self.out, "\nYou: ")?;
        self.out.flush()?;
        Ok(())
    }

    fn show_reply(&mut self, reply: &str) -> Result<()> {
        writeln!(self.out, "{}: {reply}", self.display_name)?;
        Ok(())
    }

    async fn speak(&self, reply: String) {
        let Some(voice) = self.voice.as_ref().filter(|v| v.is_enabled()) else {
            return;
        };
        let voice = Arc::clone(voice);
        if let Err(e) = tokio::task::spawn_blocking(move || voice.speak_reply(&reply)).await {
            warn!("speech task failed: {e}");
        }
    }
}

/// Read lines from `reader` on a dedicated thread and forward them.
///
/// Sends [`InputEvent::Closed`] at end of input or on a read error.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_line_reader<R>(reader: R, events: UnboundedSender<InputEvent>) -> Result<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("jarvis-stdin".to_owned())
        .spawn(move || {
            let mut reader = reader;
            loop {
                let mut line = String::new();
                let event = match reader.read_line(&mut line) {
                    Ok(0) => InputEvent::Closed,
                    Ok(_) => InputEvent::Typed(line),
                    Err(e) => {
                        warn!("failed to read input: {e}");
                        InputEvent::Closed
                    }
                };
                let done = matches!(event, InputEvent::Closed);
                if events.send(event).is_err() || done {
                    break;
                }
            }
            info!("input reader stopped");
        })
        .map(|_| ())
        .map_err(|e| AssistantError::Channel(format!("failed to spawn input reader: {e}")))
}

/// Cancel `interrupt` on Ctrl+C. A second Ctrl+C exits the process at once.
pub fn forward_interrupts(interrupt: CancellationToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt.is_cancelled() {
                warn!("second Ctrl+C, exiting immediately");
                std::process::exit(130);
            }
            info!("received Ctrl+C, shutting down...");
            interrupt.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::commands::{CommandRegistry, handler};
    use crate::context::{ContextTracker, Turn};
    use crate::llm::{BackendError, ConversationBackend};
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;

    fn echo_registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register("echo", handler(|args| Ok(args.to_owned())));
        registry
    }

    fn echo_dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            echo_registry(),
            Arc::new(ContextTracker::default()),
            None,
        ))
    }

    /// Backend that never answers within a test's lifetime.
    struct StalledBackend;

    #[async_trait]
    impl ConversationBackend for StalledBackend {
        async fn reply(
            &self,
            _input: &str,
            _history: &[Turn],
        ) -> std::result::Result<String, BackendError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_owned())
        }

        fn model_id(&self) -> &str {
            "stalled"
        }
    }

    async fn run_with(events: Vec<InputEvent>) -> (SessionEnd, String, Arc<Dispatcher>) {
        let dispatcher = echo_dispatcher();
        let (tx, mut rx) = mpsc::unbounded_channel();
        for event in events {
            tx.send(event).unwrap();
        }
        let mut session = Session::new(Arc::clone(&dispatcher), "J.A.R.V.I.S.", Vec::new());
        let end = session.run(&mut rx).await.unwrap();
        (end, String::from_utf8(session.out).unwrap(), dispatcher)
    }

    #[tokio::test]
    async fn exit_is_case_insensitive() {
        let (end, out, dispatcher) = run_with(vec![
            InputEvent::Typed("echo hello\n".to_owned()),
            InputEvent::Typed("  EXIT \n".to_owned()),
            InputEvent::Typed("echo never\n".to_owned()),
        ])
        .await;
        assert_eq!(end, SessionEnd::Exit);
        assert!(out.contains("J.A.R.V.I.S.: hello\n"));
        assert!(out.ends_with("Goodbye!\n"));
        assert!(!out.contains("never"));
        assert_eq!(dispatcher.context().recent_turns(10).len(), 1);
    }

    #[tokio::test]
    async fn interrupt_while_idle_ends_with_farewell() {
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let mut session = Session::new(echo_dispatcher(), "J.A.R.V.I.S.", Vec::new());
        session.interrupt_token().cancel();

        let end = session.run(&mut rx).await.unwrap();
        assert_eq!(end, SessionEnd::Interrupted);
        assert!(String::from_utf8(session.out).unwrap().ends_with("\nGoodbye!\n"));
    }

    #[tokio::test]
    async fn interrupt_during_a_turn_ends_the_session() {
        let dispatcher = Arc::new(Dispatcher::new(
            echo_registry(),
            Arc::new(ContextTracker::default()),
            Some(Arc::new(StalledBackend)),
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(InputEvent::Typed("hello\n".to_owned())).unwrap();

        let mut session = Session::new(dispatcher, "J.A.R.V.I.S.", Vec::new());
        let interrupt = session.interrupt_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            interrupt.cancel();
        });

        let started = Instant::now();
        let end = session.run(&mut rx).await.unwrap();
        assert_eq!(end, SessionEnd::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(5));
        let out = String::from_utf8(session.out).unwrap();
        assert!(!out.contains("too late"));
        assert!(out.ends_with("\nGoodbye!\n"));
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (end, _, dispatcher) = run_with(vec![
            InputEvent::Typed("   \n".to_owned()),
            InputEvent::Closed,
        ])
        .await;
        assert_eq!(end, SessionEnd::Closed);
        assert!(dispatcher.context().recent_turns(10).is_empty());
    }

    #[tokio::test]
    async fn spoken_commands_share_the_dispatcher() {
        let (spoken, mut replied) = SpokenCommand::new("echo from the microphone");
        let (_, out, dispatcher) = run_with(vec![
            InputEvent::Spoken(spoken),
            InputEvent::Typed("echo from the keyboard".to_owned()),
            InputEvent::Closed,
        ])
        .await;
        assert!(out.contains("[voice] You: echo from the microphone"));
        assert!(out.contains("J.A.R.V.I.S.: from the microphone"));
        assert_eq!(dispatcher.context().recent_turns(10).len(), 2);
        assert!(replied.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dropped_senders_close_the_session() {
        let (end, _, _) = run_with(Vec::new()).await;
        assert_eq!(end, SessionEnd::Closed);
    }

    #[test]
    fn banner_lists_commands() {
        let mut session = Session::new(echo_dispatcher(), "J.A.R.V.I.S.", Vec::new());
        session.print_banner().unwrap();
        let out = String::from_utf8(session.out).unwrap();
        assert_eq!(
            out,
            "J.A.R.V.I.S. initialized. Type 'exit' to quit.\nAvailable commands: echo\n"
        );
    }

    #[test]
    fn banner_warns_without_commands() {
        let dispatcher = Arc::new(Dispatcher::new(
            CommandRegistry::new(),
            Arc::new(ContextTracker::default()),
            None,
        ));
        let mut session = Session::new(dispatcher, "J.A.R.V.I.S.", Vec::new());
        session.print_banner().unwrap();
        let out = String::from_utf8(session.out).unwrap();
        assert!(out.contains("Warning: No commands were loaded!"));
    }

    #[test]
    fn line_reader_forwards_lines_then_closes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_line_reader(Cursor::new("first\nsecond\n"), tx).unwrap();
        for expected in ["first\n", "second\n"] {
            match rx.blocking_recv() {
                Some(InputEvent::Typed(line)) => assert_eq!(line, expected),
                other => panic!("expected a typed line, got {other:?}"),
            }
        }
        assert!(matches!(rx.blocking_recv(), Some(InputEvent::Closed)));
        assert!(rx.blocking_recv().is_none());
    }
}
