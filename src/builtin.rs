use crate::command::{CommandIo, ExitCode};
use crate::env::Environment;
use crate::external::find_command_path;
use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// `NAME=VALUE` where `NAME` is a valid shell identifier.
const ASSIGNMENT: &str = r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$";
/// `NAME=VALUE` for aliases, where any non-blank name is accepted.
const ALIAS_ASSIGNMENT: &str = r"^([^=\s]+)=(.*)$";
const IDENTIFIER: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid regex pattern: {pattern}"))
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode>;
}

/// Entry point stored in the registration table: raw arguments in, status out.
pub type BuiltinHandler = fn(&[String], &mut CommandIo<'_>, &mut Environment) -> Result<ExitCode>;

/// Parse `args` for `T` and run it.
///
/// `--help` output goes to stdout with status 0; argument errors go to stderr with
/// status 2 and the body is not run.
fn dispatch<T: BuiltinCommand>(
    args: &[String],
    io: &mut CommandIo<'_>,
    env: &mut Environment,
) -> Result<ExitCode> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match T::from_args(&[T::name()], &args) {
        Ok(cmd) => cmd.execute(io, env),
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            io.stdout.write_all(output.as_bytes())?;
            Ok(0)
        }
        Err(EarlyExit {
            output,
            status: Err(()),
        }) => {
            io.stderr.write_all(output.as_bytes())?;
            Ok(2)
        }
    }
}

fn entry<T: BuiltinCommand>() -> (&'static str, BuiltinHandler) {
    (T::name(), dispatch::<T>)
}

/// The static registration table, in the order `type` and completion list them.
pub(crate) fn registry() -> Vec<(&'static str, BuiltinHandler)> {
    vec![
        entry::<Echo>(),
        entry::<Pwd>(),
        entry::<Cd>(),
        entry::<Exit>(),
        entry::<Type>(),
        entry::<Set>(),
        entry::<Export>(),
        entry::<Unset>(),
        entry::<Alias>(),
        entry::<Unalias>(),
    ]
}

pub fn is_builtin(name: &str) -> bool {
    registry().iter().any(|(builtin, _)| *builtin == name)
}

/// Run a built-in handler, turning a body error into a message on the
/// invocation's error stream and status 1.
pub(crate) fn invoke(
    handler: BuiltinHandler,
    args: &[String],
    io: &mut CommandIo<'_>,
    env: &mut Environment,
) -> ExitCode {
    match handler(args, io, env) {
        Ok(code) => code,
        Err(e) => {
            let _ = writeln!(io.stderr, "{e:#}");
            1
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        writeln!(io.stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory, or
    /// starting with `~`. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl Cd {
    fn expand_home(target: &str, env: &Environment) -> Result<PathBuf> {
        let home = || env.home_dir().ok_or_else(|| anyhow!("cd: HOME not set"));
        if target == "~" {
            home()
        } else if let Some(rest) = target.strip_prefix("~/") {
            Ok(home()?.join(rest))
        } else {
            Ok(PathBuf::from(target))
        }
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => Self::expand_home(t, env)?,
            _ => env
                .home_dir()
                .ok_or_else(|| anyhow!("cd: no target and HOME not set"))?,
        };

        let new_dir = env.current_dir.join(target);
        let canonical = match fs::canonicalize(&new_dir) {
            Ok(dir) if dir.is_dir() => dir,
            _ => {
                let shown = self.target.as_deref().unwrap_or_default();
                return Err(anyhow!("cd: {shown}: No such file or directory"));
            }
        };

        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status (0 when omitted).
pub struct Exit {
    #[argh(positional)]
    /// status to exit with.
    pub code: Option<ExitCode>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(self.code.unwrap_or(0))
    }
}

/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed.
///
/// Arguments are not parsed as options: only leading `-n` words are taken as the
/// switch, and everything else (`--help`, `--`, `-e`) is printed as-is.
pub struct Echo {
    /// do not output the trailing newline.
    pub no_newline: bool,
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let switches = args.iter().take_while(|arg| **arg == "-n").count();
        Ok(Echo {
            no_newline: switches > 0,
            args: args[switches..].iter().map(|arg| arg.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, io: &mut CommandIo<'_>, _env: &mut Environment) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(io.stdout, "{}", s)?;
        } else {
            writeln!(io.stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Describe how each name would be interpreted as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(self, io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        let mut status = 0;
        for name in &self.names {
            if is_builtin(name) {
                writeln!(io.stdout, "{name} is a shell builtin")?;
                continue;
            }
            match find_command_path(&env.search_path(), &env.current_dir, Path::new(name)) {
                Some(path) => writeln!(io.stdout, "{name} is {}", path.display())?,
                None => {
                    writeln!(io.stdout, "{name}: not found")?;
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

fn print_sorted<'a>(
    out: &mut dyn Write,
    entries: impl Iterator<Item = (&'a String, &'a String)>,
    prefix: &str,
) -> Result<()> {
    let mut entries: Vec<_> = entries.collect();
    entries.sort();
    for (name, value) in entries {
        writeln!(out, "{prefix}{name}={value}")?;
    }
    Ok(())
}

#[derive(FromArgs)]
/// Assign shell variables. Without arguments, list the shell-only variables.
pub struct Set {
    #[argh(positional, greedy)]
    /// assignments of the form NAME=VALUE; anything else is skipped.
    pub assignments: Vec<String>,
}

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "set"
    }

    fn execute(self, io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        if self.assignments.is_empty() {
            print_sorted(io.stdout, env.vars.locals().iter(), "")?;
            return Ok(0);
        }
        let assignment = compile(ASSIGNMENT)?;
        for arg in &self.assignments {
            if let Some(caps) = assignment.captures(arg) {
                env.vars.define(&caps[1], &caps[2]);
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Mark variables for export to child processes, optionally assigning them.
/// Without arguments, list the exported variables.
pub struct Export {
    #[argh(positional, greedy)]
    /// NAME to export as-is, or NAME=VALUE to assign and export.
    pub names: Vec<String>,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn execute(self, io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        if self.names.is_empty() {
            print_sorted(io.stdout, env.vars.exported().iter(), "export ")?;
            return Ok(0);
        }

        let assignment = compile(ASSIGNMENT)?;
        let identifier = compile(IDENTIFIER)?;
        let mut status = 0;
        for arg in &self.names {
            if let Some(caps) = assignment.captures(arg) {
                env.vars.define_exported(&caps[1], &caps[2]);
            } else if identifier.is_match(arg) {
                env.vars.promote_to_exported(arg);
            } else {
                writeln!(io.stderr, "export: `{arg}': not a valid identifier")?;
                status = 1;
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Remove variables from the shell, whether exported or not.
pub struct Unset {
    #[argh(positional, greedy)]
    /// variable names to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn execute(self, _io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        for name in &self.names {
            env.vars.remove(name);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Define or display aliases. Without arguments, print every alias.
pub struct Alias {
    #[argh(positional, greedy)]
    /// NAME to print, or NAME=VALUE to define.
    pub definitions: Vec<String>,
}

impl BuiltinCommand for Alias {
    fn name() -> &'static str {
        "alias"
    }

    fn execute(self, io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        if self.definitions.is_empty() {
            for (name, value) in env.aliases.iter() {
                writeln!(io.stdout, "alias {name}='{value}'")?;
            }
            return Ok(0);
        }

        let assignment = compile(ALIAS_ASSIGNMENT)?;
        let mut status = 0;
        for arg in &self.definitions {
            if let Some(caps) = assignment.captures(arg) {
                env.aliases.define(&caps[1], &caps[2]);
            } else if let Some(value) = env.aliases.lookup(arg) {
                writeln!(io.stdout, "alias {arg}='{value}'")?;
            } else {
                writeln!(io.stderr, "alias: {arg}: not found")?;
                status = 1;
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Remove aliases.
pub struct Unalias {
    #[argh(positional, greedy)]
    /// alias names to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unalias {
    fn name() -> &'static str {
        "unalias"
    }

    fn execute(self, io: &mut CommandIo<'_>, env: &mut Environment) -> Result<ExitCode> {
        if self.names.is_empty() {
            writeln!(io.stderr, "unalias: usage: unalias name [name ...]")?;
            return Ok(2);
        }

        let mut status = 0;
        for name in &self.names {
            if !env.aliases.remove(name) {
                writeln!(io.stderr, "unalias: {name}: not found")?;
                status = 1;
            }
        }
        Ok(status)
    }
}
