//! Wondershaper command construction and execution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::{io, process};

use crate::shaping::ShapingParameters;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("non-zero exit status: {}", .0.status)]
    NonZero(Output),
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct Output {
    pub status: process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl From<process::Output> for Output {
    fn from(value: process::Output) -> Self {
        Self {
            status: value.status,
            stdout: String::from_utf8_lossy(&value.stdout).to_string(),
            stderr: String::from_utf8_lossy(&value.stderr).to_string(),
        }
    }
}

/// A program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes command lines.
///
/// The production runner spawns processes; tests substitute a recorder.
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &CommandLine) -> Result<Output, CommandError>;
}

/// Runs commands as child processes and waits for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandLine) -> Result<Output, CommandError> {
        let mut command = process::Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped());

        tracing::debug!(?command, "running command");

        let output: Output = command.spawn()?.wait_with_output()?.into();

        if !output.status.success() {
            return Err(CommandError::NonZero(output));
        }

        tracing::debug!(stdout = %output.stdout.trim(), "command finished");
        Ok(output)
    }
}

/// Translates shaping parameters into wondershaper invocations.
pub struct Wondershaper {
    program: PathBuf,
    interface: String,
    runner: Box<dyn CommandRunner>,
}

impl Wondershaper {
    pub const RATE_UP_FLAG: &'static str = "-u";
    pub const RATE_DOWN_FLAG: &'static str = "-d";
    pub const DELAY_FLAG: &'static str = "-l";
    pub const JITTER_FLAG: &'static str = "-j";
    pub const PACKET_ERROR_FLAG: &'static str = "-e";

    pub fn new(
        program: impl Into<PathBuf>,
        interface: impl Into<String>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self {
            program: program.into(),
            interface: interface.into(),
            runner,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Removes every shaping rule from the interface.
    pub fn clear_command(&self) -> CommandLine {
        CommandLine::new(&self.program)
            .arg("-ca")
            .arg(&self.interface)
    }

    /// Builds the command applying `params`.
    ///
    /// Rate is symmetric. Jitter is only emitted together with a delay.
    pub fn set_command(&self, params: &ShapingParameters) -> CommandLine {
        let mut cmd = CommandLine::new(&self.program)
            .arg("-a")
            .arg(&self.interface)
            .arg(Self::RATE_UP_FLAG)
            .arg(params.rate)
            .arg(Self::RATE_DOWN_FLAG)
            .arg(params.rate);

        if params.delay != 0 {
            cmd = cmd.arg(Self::DELAY_FLAG).arg(params.delay);
            if params.jitter != 0 {
                cmd = cmd.arg(Self::JITTER_FLAG).arg(params.jitter);
            }
        }

        if params.packet_error != 0 {
            cmd = cmd.arg(Self::PACKET_ERROR_FLAG).arg(params.packet_error);
        }

        cmd
    }

    /// Clears the interface, then applies `params`.
    ///
    /// Best effort: failures are logged and otherwise ignored.
    pub fn apply(&self, params: &ShapingParameters) {
        let set = self.set_command(params);
        tracing::info!(command = %set, "Applying traffic shaping");

        for cmd in [self.clear_command(), set] {
            if let Err(e) = self.runner.run(&cmd) {
                match &e {
                    CommandError::NonZero(output) => tracing::warn!(
                        command = %cmd,
                        status = %output.status,
                        stderr = %output.stderr.trim(),
                        "Shaping command failed"
                    ),
                    CommandError::Io(_) => tracing::warn!(
                        command = %cmd,
                        error = %e,
                        "Shaping command could not be run"
                    ),
                }
            }
        }
    }
}

impl fmt::Debug for Wondershaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wondershaper")
            .field("program", &self.program)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Records every command instead of running it.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingRunner {
        pub(crate) commands: Arc<Mutex<Vec<CommandLine>>>,
    }

    impl RecordingRunner {
        pub(crate) fn commands(&self) -> Vec<CommandLine> {
            self.commands.lock().clone()
        }

        pub(crate) fn count(&self) -> usize {
            self.commands.lock().len()
        }
    }

    impl CommandLine {
        pub(crate) fn has_flag(&self, flag: &str) -> bool {
            self.args.iter().any(|a| a == flag)
        }

        /// The argument following `flag`, if any.
        pub(crate) fn flag_value(&self, flag: &str) -> Option<&str> {
            self.args
                .iter()
                .position(|a| a == flag)
                .and_then(|i| self.args.get(i + 1))
                .map(String::as_str)
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, cmd: &CommandLine) -> Result<Output, CommandError> {
            self.commands.lock().push(cmd.clone());
            Err(CommandError::Io(io::Error::from(io::ErrorKind::NotFound)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    fn shaper(runner: RecordingRunner) -> Wondershaper {
        Wondershaper::new("/wondershaper", "eth0", Box::new(runner))
    }

    fn params(rate: u32, delay: u32, jitter: u32, packet_error: u32) -> ShapingParameters {
        ShapingParameters {
            rate,
            delay,
            jitter,
            packet_error,
        }
    }

    #[test]
    fn test_clear_command() {
        let cmd = shaper(RecordingRunner::default()).clear_command();
        assert_eq!(cmd.to_string(), "/wondershaper -ca eth0");
    }

    #[test]
    fn test_rate_only() {
        let cmd = shaper(RecordingRunner::default()).set_command(&params(5000, 0, 0, 0));
        assert_eq!(cmd.to_string(), "/wondershaper -a eth0 -u 5000 -d 5000");
    }

    #[test]
    fn test_all_options() {
        let cmd = shaper(RecordingRunner::default()).set_command(&params(5000, 50, 10, 2));
        assert_eq!(
            cmd.to_string(),
            "/wondershaper -a eth0 -u 5000 -d 5000 -l 50 -j 10 -e 2"
        );
    }

    #[test]
    fn test_jitter_without_delay_is_dropped() {
        let cmd = shaper(RecordingRunner::default()).set_command(&params(5000, 0, 10, 1));
        assert!(!cmd.has_flag(Wondershaper::JITTER_FLAG));
        assert!(!cmd.has_flag(Wondershaper::DELAY_FLAG));
        assert_eq!(cmd.flag_value(Wondershaper::PACKET_ERROR_FLAG), Some("1"));
    }

    #[test]
    fn test_jitter_never_emitted_without_delay() {
        let shaper = shaper(RecordingRunner::default());
        for delay in [0, 1, 100] {
            for jitter in [0, 1, 100] {
                let cmd = shaper.set_command(&params(1000, delay, jitter, 0));
                if cmd.has_flag(Wondershaper::JITTER_FLAG) {
                    assert_ne!(delay, 0);
                }
            }
        }
    }

    #[test]
    fn test_apply_clears_first_and_survives_failures() {
        let runner = RecordingRunner::default();
        let shaper = shaper(runner.clone());

        shaper.apply(&params(2000, 20, 0, 0));

        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], shaper.clear_command());
        assert_eq!(commands[1].flag_value(Wondershaper::DELAY_FLAG), Some("20"));
    }

    #[test]
    fn test_system_runner_missing_program() {
        let cmd = CommandLine::new("/nonexistent/wondershaper").arg("-ca").arg("eth0");
        assert!(matches!(SystemRunner.run(&cmd), Err(CommandError::Io(_))));
    }
}
