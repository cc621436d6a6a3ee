//! Locating external programs and interpreting how they finished.

use crate::command::ExitCode;
use crate::env::Environment;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// PATH-search collaborator used by the command resolver.
pub trait Locate {
    /// Absolute (or cwd-joined) path of the executable `name`, if any.
    fn locate(&self, name: &str, env: &Environment) -> Option<PathBuf>;

    /// Names of every executable reachable through the search path.
    fn executables(&self, env: &Environment) -> BTreeSet<String>;
}

/// Searches the shell's exported `PATH`, resolving relative names against the
/// tracked current directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathLocator;

impl Locate for PathLocator {
    fn locate(&self, name: &str, env: &Environment) -> Option<PathBuf> {
        find_command_path(&env.search_path(), &env.current_dir, Path::new(name))
    }

    fn executables(&self, env: &Environment) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for dir in std::env::split_paths(&env.search_path()) {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if is_executable(&entry.path()) {
                    names.insert(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        names
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Relative with a separator (`bin/sh`, `./foo`): joined onto `cwd`.
/// - Single path component: search each directory in `search_paths` (PATH)
///   and return the first executable match.
/// - Empty path: returns `None`.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return find_by_path(path);
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        // Empty path -> not found
        (None, _) => None,
        (Some(x), None) if !path.starts_with(".") => find_in_path(search_paths, x.as_os_str()),
        _ => find_by_path(&cwd.join(path)),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| find_by_path(&dir.join(cmd)))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    is_executable(path).then(|| path.to_path_buf())
}

#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Exit code of a finished child, folding signals into the `128 + n` convention.
pub(crate) fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
