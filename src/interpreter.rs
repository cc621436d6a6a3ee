use crate::command::{ExitCode, Streams};
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::executor::{ExecutionResult, PipelineExecutor};
use crate::parser::parse;
use crate::resolver::CommandResolver;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result};
use std::io;

/// A minimal shell that parses and runs one line at a time.
///
/// The interpreter owns the whole shell context: the [`Environment`] (variables,
/// aliases, current directory) and the [`CommandResolver`] with its cache. Lines are
/// fully executed before the next one is read.
///
/// Example
/// ```
/// use pipesh::{Interpreter, Streams};
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let mut err = Vec::new();
/// let result = sh.run_line("echo hello world", &mut Streams::captured(&mut out, &mut err));
/// assert_eq!(result.status, 0);
/// assert_eq!(out, b"hello world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    resolver: CommandResolver,
    config: ShellConfig,
}

impl Interpreter {
    /// Create an interpreter in the process's current directory and environment.
    pub fn new(config: ShellConfig) -> Self {
        Self::with_env(config, Environment::new())
    }

    pub fn with_env(config: ShellConfig, env: Environment) -> Self {
        Self {
            env,
            resolver: CommandResolver::new(config.resolver.cache_capacity),
            config,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn resolver(&self) -> &CommandResolver {
        &self.resolver
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Parse and execute one input line.
    pub fn run_line(&mut self, line: &str, streams: &mut Streams<'_>) -> ExecutionResult {
        let pipeline = parse(line, &self.env.aliases, &self.env.vars);
        log::debug!("interpreter: {line:?} -> {pipeline:?}");
        PipelineExecutor::new(&mut self.resolver, &mut self.env)
            .with_feeder_grace(self.config.pipeline.feeder_grace())
            .execute(&pipeline, streams)
    }

    /// Execute one line against the process's own terminal.
    pub fn run_terminal(&mut self, line: &str) -> ExecutionResult {
        let mut stdout = io::stdout().lock();
        let mut stderr = io::stderr();
        let mut streams = Streams::terminal(&mut stdout, &mut stderr);
        self.run_line(line, &mut streams)
    }

    /// Interactive read-eval-print loop.
    ///
    /// Blank lines are skipped, `Ctrl-C` drops the current line and `Ctrl-D` ends
    /// the session. Returns the status of the last executed line.
    pub fn repl(&mut self) -> Result<ExitCode> {
        let editor_config = rustyline::Config::builder()
            .max_history_size(self.config.history_size)?
            .build();
        let mut rl = DefaultEditor::with_config(editor_config)?;

        let mut status = 0;
        loop {
            match rl.readline(&self.config.prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;

                    let result = self.run_terminal(&line);
                    status = result.status;
                    if result.should_terminate {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(status)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}
