//! A small POSIX-flavoured shell: line expansion plus a segmented pipeline executor.
//!
//! One input line goes through [`parser::parse`] (quotes, escapes, `$NAME`, aliases,
//! redirects) into a pipeline of invocations. The [`executor`] splits that pipeline
//! into segments: built-ins run in-process with buffered input, while consecutive
//! external commands run as one OS-level process chain.
//!
//! The main entry point is [`Interpreter`], which owns the shell context and runs
//! lines either against the terminal or against in-memory [`Streams`].

pub mod alias;
pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod executor;
pub mod external;
mod interpreter;
mod lexer;
pub mod logging;
pub mod parser;
pub mod redirect;
pub mod resolver;
pub mod segment;

pub use command::{ExitCode, Streams};
pub use config::ShellConfig;
pub use env::Environment;
pub use executor::ExecutionResult;
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
