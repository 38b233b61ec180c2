use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// Resolve a configured tool path to an existing file.
///
/// A bare program name (no path separator) is looked up on `PATH`; anything
/// else must point at a regular file as given.
pub fn resolve_executable(path: &Path) -> io::Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(ErrorKind::InvalidInput, "path is empty"));
    }

    if path.components().count() > 1 || path.is_absolute() {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(io::Error::new(ErrorKind::NotFound, "not a file"))
        };
    }

    which::which(path)
        .map_err(|err| io::Error::new(ErrorKind::NotFound, format!("not found on PATH: {err}")))
}
