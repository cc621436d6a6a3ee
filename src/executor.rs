//! Running parsed pipelines: built-ins in-process, external runs as OS process chains.

use crate::builtin::{self, BuiltinHandler};
use crate::command::{CommandIo, ExitCode, NOT_FOUND, Streams};
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::exit_code;
use crate::parser::{Invocation, RedirectStream};
use crate::redirect::{open_target, with_redirect};
use crate::resolver::{CommandResolver, Handler};
use crate::segment::{Segment, segment};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

pub const DEFAULT_FEEDER_GRACE: Duration = Duration::from_millis(100);

/// Outcome of one input line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// `exit` ran; the read loop should stop.
    pub should_terminate: bool,
    /// Status of the last segment that ran.
    pub status: ExitCode,
}

impl ExecutionResult {
    fn finished(status: ExitCode) -> Self {
        Self {
            should_terminate: false,
            status,
        }
    }
}

/// Where the first process of a chain reads from.
enum ChainInput {
    /// The shell's own stdin (interactive single commands).
    Inherit,
    /// Closed immediately, so readers see end of input.
    Closed,
    /// An upstream segment's output, written by a feeder thread.
    Buffer(Vec<u8>),
}

struct ChainOutcome {
    /// Captured stdout of the tail, empty when it went elsewhere.
    output: Vec<u8>,
    status: ExitCode,
}

/// Executes pipelines against one shell context.
///
/// Segments run strictly one after another. Each segment's output is buffered and
/// handed to the next one; the last segment writes to `streams` (or, in terminal
/// mode, external processes inherit the terminal directly).
pub struct PipelineExecutor<'a> {
    resolver: &'a mut CommandResolver,
    env: &'a mut Environment,
    feeder_grace: Duration,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(resolver: &'a mut CommandResolver, env: &'a mut Environment) -> Self {
        Self {
            resolver,
            env,
            feeder_grace: DEFAULT_FEEDER_GRACE,
        }
    }

    /// How long to wait for a stdin feeder after its chain has exited.
    pub fn with_feeder_grace(mut self, grace: Duration) -> Self {
        self.feeder_grace = grace;
        self
    }

    pub fn execute(&mut self, pipeline: &[Invocation], streams: &mut Streams<'_>) -> ExecutionResult {
        match pipeline {
            [] => ExecutionResult::default(),
            [single] => self.execute_single(single, streams),
            _ => self.execute_pipeline(pipeline, streams),
        }
    }

    /// Run one invocation without segmenting.
    pub fn execute_single(
        &mut self,
        invocation: &Invocation,
        streams: &mut Streams<'_>,
    ) -> ExecutionResult {
        self.env.should_exit = false;
        match self.resolver.resolve(&invocation.command, self.env) {
            None => {
                streams.not_found(&invocation.command);
                ExecutionResult::finished(NOT_FOUND)
            }
            Some(Handler::Builtin(handler)) => {
                let (_, status) = self.run_builtin(handler, invocation, None, true, streams);
                ExecutionResult {
                    should_terminate: self.env.should_exit,
                    status,
                }
            }
            Some(Handler::External(path)) => {
                let input = if streams.is_terminal() {
                    ChainInput::Inherit
                } else {
                    ChainInput::Closed
                };
                match self.run_chain(vec![(invocation, path)], input, true, streams) {
                    Ok(outcome) => ExecutionResult::finished(outcome.status),
                    Err(e) => {
                        streams.report(&e);
                        ExecutionResult::finished(1)
                    }
                }
            }
        }
    }

    /// Run a pipeline of two or more invocations, segment by segment.
    pub fn execute_pipeline(
        &mut self,
        pipeline: &[Invocation],
        streams: &mut Streams<'_>,
    ) -> ExecutionResult {
        assert!(
            pipeline.len() >= 2,
            "execute_pipeline needs at least two invocations"
        );
        self.env.should_exit = false;

        let segments = segment(pipeline, self.resolver);
        log::debug!("executor: segments {segments:?}");

        let mut buffer: Option<Vec<u8>> = None;
        let mut status = 0;
        for (i, seg) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            match seg {
                Segment::BuiltIn {
                    handler,
                    invocation,
                } => {
                    let (output, code) =
                        self.run_builtin(*handler, invocation, buffer.take(), is_last, streams);
                    buffer = Some(output);
                    status = code;
                    if self.env.should_exit {
                        return ExecutionResult {
                            should_terminate: true,
                            status,
                        };
                    }
                }
                Segment::External { invocations } => {
                    let Some(chain) = self.resolve_chain(invocations, streams) else {
                        buffer = Some(Vec::new());
                        status = NOT_FOUND;
                        continue;
                    };
                    let input = match buffer.take() {
                        Some(data) if !data.is_empty() => ChainInput::Buffer(data),
                        _ => ChainInput::Closed,
                    };
                    match self.run_chain(chain, input, is_last, streams) {
                        Ok(outcome) => {
                            buffer = Some(outcome.output);
                            status = outcome.status;
                        }
                        Err(e) => {
                            streams.report(&e);
                            return ExecutionResult::finished(1);
                        }
                    }
                }
            }
        }
        ExecutionResult::finished(status)
    }

    /// Run a built-in with `input` as its stdin.
    ///
    /// The last segment writes straight to `streams.stdout`; otherwise output is
    /// captured and returned for the next segment.
    fn run_builtin(
        &mut self,
        handler: BuiltinHandler,
        invocation: &Invocation,
        input: Option<Vec<u8>>,
        is_last: bool,
        streams: &mut Streams<'_>,
    ) -> (Vec<u8>, ExitCode) {
        let mut stdin = Cursor::new(input.unwrap_or_default());
        let mut captured = Vec::new();
        let cwd = self.env.current_dir.clone();
        let env = &mut *self.env;

        let stdout: &mut dyn Write = if is_last {
            &mut *streams.stdout
        } else {
            &mut captured
        };
        let result = with_redirect(
            invocation.redirect.as_ref(),
            &cwd,
            stdout,
            &mut *streams.stderr,
            |stdout, stderr| {
                let mut io = CommandIo {
                    stdin: &mut stdin,
                    stdout,
                    stderr,
                };
                builtin::invoke(handler, &invocation.arguments, &mut io, env)
            },
        );
        let _ = streams.stdout.flush();

        match result {
            Ok(status) => (captured, status),
            Err(e) => {
                streams.report(&e);
                (captured, 1)
            }
        }
    }

    /// Resolve every name of an external run, or report the first unknown one.
    fn resolve_chain<'p>(
        &mut self,
        invocations: &[&'p Invocation],
        streams: &mut Streams<'_>,
    ) -> Option<Vec<(&'p Invocation, PathBuf)>> {
        let mut chain = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            match self.resolver.resolve(&invocation.command, self.env) {
                Some(Handler::External(path)) => chain.push((*invocation, path)),
                _ => {
                    streams.not_found(&invocation.command);
                    return None;
                }
            }
        }
        Some(chain)
    }

    fn command(&self, invocation: &Invocation, path: &Path) -> Command {
        let mut cmd = Command::new(path);
        cmd.args(&invocation.arguments)
            .env_clear()
            .envs(self.env.vars.exported_snapshot())
            .current_dir(&self.env.current_dir);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(&invocation.command);
        }
        cmd
    }

    /// Launch `chain` as one OS-level pipeline and wait for all of it.
    ///
    /// Unless the chain is last in terminal mode, the tail's stdout is read into
    /// the returned buffer and every stderr is drained on a scoped thread, then
    /// forwarded to `streams.stderr` in chain order.
    fn run_chain(
        &mut self,
        chain: Vec<(&Invocation, PathBuf)>,
        input: ChainInput,
        is_last: bool,
        streams: &mut Streams<'_>,
    ) -> Result<ChainOutcome, ShellError> {
        let _ = streams.stdout.flush();
        let inherit = is_last && streams.is_terminal();
        let len = chain.len();

        let mut children: Vec<Child> = Vec::with_capacity(len);
        let mut upstream: Option<ChildStdout> = None;
        for (i, (invocation, path)) in chain.iter().enumerate() {
            let tail = i + 1 == len;
            let mut cmd = self.command(invocation, path);

            if i == 0 {
                cmd.stdin(match input {
                    ChainInput::Inherit => Stdio::inherit(),
                    ChainInput::Closed => Stdio::null(),
                    ChainInput::Buffer(_) => Stdio::piped(),
                });
            } else {
                cmd.stdin(upstream.take().map_or_else(Stdio::null, Stdio::from));
            }

            let redirect = match &invocation.redirect {
                Some(r) => match open_target(r, &self.env.current_dir) {
                    Ok(file) => Some((r.stream, file)),
                    Err(e) => {
                        reap(&mut children);
                        return Err(e);
                    }
                },
                None => None,
            };
            let (stdout_file, stderr_file) = match redirect {
                Some((RedirectStream::Stdout, file)) => (Some(file), None),
                Some((RedirectStream::Stderr, file)) => (None, Some(file)),
                None => (None, None),
            };

            cmd.stdout(match stdout_file {
                Some(file) => Stdio::from(file),
                None if tail && inherit => Stdio::inherit(),
                None => Stdio::piped(),
            });
            cmd.stderr(match stderr_file {
                Some(file) => Stdio::from(file),
                None if inherit => Stdio::inherit(),
                None => Stdio::piped(),
            });

            log::debug!("executor: spawning {} {:?}", path.display(), invocation.arguments);
            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    reap(&mut children);
                    return Err(ShellError::Pipeline(e));
                }
            };
            if !tail {
                upstream = child.stdout.take();
            }
            children.push(child);
        }

        let feeder = match input {
            ChainInput::Buffer(data) => match children.first_mut().and_then(|c| c.stdin.take()) {
                Some(stdin) => match spawn_feeder(stdin, data) {
                    Ok(feeder) => Some(feeder),
                    Err(e) => {
                        reap(&mut children);
                        return Err(ShellError::Pipeline(e));
                    }
                },
                None => None,
            },
            _ => None,
        };

        let tail_stdout = children.last_mut().and_then(|child| child.stdout.take());
        let stderr_pipes: Vec<_> = children
            .iter_mut()
            .filter_map(|child| child.stderr.take())
            .collect();

        let (output, read, errors) = thread::scope(|s| {
            let drains: Vec<_> = stderr_pipes
                .into_iter()
                .map(|mut pipe| {
                    s.spawn(move || {
                        let mut buf = Vec::new();
                        let _ = pipe.read_to_end(&mut buf);
                        buf
                    })
                })
                .collect();

            let mut output = Vec::new();
            let read = match tail_stdout {
                Some(mut stdout) => stdout.read_to_end(&mut output).map(drop),
                None => Ok(()),
            };
            let errors: Vec<Vec<u8>> = drains
                .into_iter()
                .map(|drain| drain.join().unwrap_or_default())
                .collect();
            (output, read, errors)
        });

        let mut status = 0;
        let mut wait_error = None;
        for child in &mut children {
            match child.wait() {
                Ok(exit) => status = exit_code(exit),
                Err(e) => wait_error = Some(e),
            }
        }

        if let Some((done, handle)) = feeder {
            match done.recv_timeout(self.feeder_grace) {
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "executor: stdin feeder still running after {:?}, abandoning it",
                        self.feeder_grace
                    );
                }
                _ => {
                    let _ = handle.join();
                }
            }
        }

        for bytes in &errors {
            let _ = streams.stderr.write_all(bytes);
        }
        let _ = streams.stderr.flush();

        if let Some(e) = wait_error {
            return Err(ShellError::Pipeline(e));
        }
        read.map_err(ShellError::Pipeline)?;

        if is_last {
            let _ = streams.stdout.write_all(&output);
            let _ = streams.stdout.flush();
            return Ok(ChainOutcome {
                output: Vec::new(),
                status,
            });
        }
        Ok(ChainOutcome { output, status })
    }
}

/// Write `data` into a child's stdin on a dedicated thread.
///
/// The receiver fires once the write is over; a broken pipe means the reader
/// exited early and is not an error.
fn spawn_feeder(
    mut stdin: ChildStdin,
    data: Vec<u8>,
) -> std::io::Result<(mpsc::Receiver<()>, thread::JoinHandle<()>)> {
    let (done_tx, done_rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("pipesh-feeder".to_string())
        .spawn(move || {
            if let Err(e) = stdin.write_all(&data) {
                log::trace!("executor: feeder stopped early: {e}");
            }
            drop(stdin);
            let _ = done_tx.send(());
        })?;
    Ok((done_rx, handle))
}

/// Kill and wait for children already spawned for a chain that failed to start.
fn reap(children: &mut [Child]) {
    for child in children {
        let _ = child.kill();
        let _ = child.wait();
    }
}
