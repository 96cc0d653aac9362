//! Speech collaborators backed by external programs.
//!
//! Lets users plug in any local STT/TTS tool (`espeak`, `say`, `piper`, a
//! whisper wrapper script, ...) from config without linking audio stacks.

use super::{SpeechRecognizer, SpeechSynthesizer};
use crate::error::{AssistantError, Result};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Environment variable carrying the capture start timeout, in seconds.
pub const LISTEN_TIMEOUT_ENV: &str = "JARVIS_LISTEN_TIMEOUT_SECS";
/// Environment variable carrying the maximum phrase length, in seconds.
pub const PHRASE_LIMIT_ENV: &str = "JARVIS_PHRASE_LIMIT_SECS";

#[derive(Debug, Clone)]
struct ProgramLine {
    program: String,
    args: Vec<String>,
}

impl ProgramLine {
    fn parse(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
            .ok_or_else(|| AssistantError::Config("voice command line is empty".to_owned()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

fn exit_detail(status: std::process::ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "unknown".to_owned(), |c| c.to_string())
}

/// Speaks by running a program with the text as its final argument.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    line: ProgramLine,
}

impl CommandSynthesizer {
    /// # Errors
    ///
    /// Returns a config error if `argv` is empty.
    pub fn new(argv: &[String]) -> Result<Self> {
        Ok(Self {
            line: ProgramLine::parse(argv)?,
        })
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str) -> Result<()> {
        let status = self
            .line
            .command()
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| {
                AssistantError::Voice(format!("failed to run {}: {e}", self.line.program))
            })?;
        if !status.success() {
            return Err(AssistantError::Voice(format!(
                "{} exited with status {}",
                self.line.program,
                exit_detail(status)
            )));
        }
        Ok(())
    }
}

/// Transcribes by running a program that records one phrase and prints the
/// transcript on stdout.
///
/// Timing limits are passed through [`LISTEN_TIMEOUT_ENV`] and
/// [`PHRASE_LIMIT_ENV`]. Calibration is left to the program.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    line: ProgramLine,
}

impl CommandRecognizer {
    /// # Errors
    ///
    /// Returns a config error if `argv` is empty.
    pub fn new(argv: &[String]) -> Result<Self> {
        Ok(Self {
            line: ProgramLine::parse(argv)?,
        })
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn calibrate(&mut self, _duration: Duration) -> Result<()> {
        Ok(())
    }

    fn transcribe(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Option<String>> {
        let output = self
            .line
            .command()
            .env(LISTEN_TIMEOUT_ENV, timeout.as_secs_f32().to_string())
            .env(PHRASE_LIMIT_ENV, phrase_limit.as_secs_f32().to_string())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                AssistantError::Voice(format!("failed to run {}: {e}", self.line.program))
            })?;

        if !output.status.success() {
            return Err(AssistantError::Voice(format!(
                "{} exited with status {}",
                self.line.program,
                exit_detail(output.status)
            )));
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        Ok((!transcript.is_empty()).then_some(transcript))
    }
}
