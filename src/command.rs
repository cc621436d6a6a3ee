use std::io::{Read, Write};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Status reported when a command name cannot be resolved.
pub const NOT_FOUND: ExitCode = 127;

/// Streams handed to a built-in for one invocation.
///
/// `stdin` is the upstream pipeline buffer (or an empty reader); `stdout` and
/// `stderr` are whatever the executor routed for this invocation: the shell's own
/// streams, a capture buffer, or a redirect file.
pub struct CommandIo<'a> {
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
}

/// The shell's own output sinks.
///
/// In terminal mode the final segment of a pipeline inherits the process
/// descriptors directly, so external programs talk to the terminal. In captured
/// mode that output is read back and written into `stdout`/`stderr` instead,
/// which lets the whole executor run against in-memory buffers.
pub struct Streams<'a> {
    pub stdout: &'a mut dyn Write,
    pub stderr: &'a mut dyn Write,
    terminal: bool,
}

impl<'a> Streams<'a> {
    pub fn terminal(stdout: &'a mut dyn Write, stderr: &'a mut dyn Write) -> Self {
        Self {
            stdout,
            stderr,
            terminal: true,
        }
    }

    pub fn captured(stdout: &'a mut dyn Write, stderr: &'a mut dyn Write) -> Self {
        Self {
            stdout,
            stderr,
            terminal: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Print a diagnostic line on the shell's error stream.
    pub(crate) fn report(&mut self, message: impl std::fmt::Display) {
        let _ = writeln!(self.stderr, "{message}");
        let _ = self.stderr.flush();
    }

    /// Print the resolution-failure line, which goes to stdout on purpose.
    pub(crate) fn not_found(&mut self, name: &str) {
        let _ = writeln!(self.stdout, "{name}: not found");
        let _ = self.stdout.flush();
    }
}
