//! Opening redirect targets and applying them around one invocation.

use crate::error::ShellError;
use crate::parser::{Redirect, RedirectMode, RedirectStream};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

/// Join `target` onto `cwd` and fold `.`/`..` lexically.
pub fn resolve_target(target: &str, cwd: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in cwd.join(target).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Open the redirect target, creating it and any missing parent directories.
pub fn open_target(redirect: &Redirect, cwd: &Path) -> Result<File, ShellError> {
    let path = resolve_target(&redirect.target, cwd);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ShellError::Redirect)?;
    }

    let mut options = OpenOptions::new();
    options.create(true);
    match redirect.mode {
        RedirectMode::Rewrite => options.write(true).truncate(true),
        RedirectMode::Append => options.append(true),
    };
    log::debug!("redirect: {:?} -> {}", redirect.stream, path.display());
    options.open(&path).map_err(ShellError::Redirect)
}

/// Run `f` with the redirected stream swapped for the target file.
///
/// Only the designated stream is replaced; the other is passed through. The file
/// is flushed and closed when `f` returns, whatever it returned.
pub fn with_redirect<R>(
    redirect: Option<&Redirect>,
    cwd: &Path,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    f: impl FnOnce(&mut dyn Write, &mut dyn Write) -> R,
) -> Result<R, ShellError> {
    let Some(redirect) = redirect else {
        return Ok(f(stdout, stderr));
    };

    let mut file = BufWriter::new(open_target(redirect, cwd)?);
    let result = match redirect.stream {
        RedirectStream::Stdout => f(&mut file, stderr),
        RedirectStream::Stderr => f(stdout, &mut file),
    };
    file.flush().map_err(ShellError::Redirect)?;
    Ok(result)
}
