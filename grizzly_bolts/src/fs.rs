//! Filesystem helpers: the harness scratch area and atomic writes.

use std::{
    env,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

use crate::Error;

/// Environment variable overriding the base of the harness scratch area.
pub const GRZ_TMP_ENV: &str = "GRZ_TMP";

/// Name of the scratch area below the system temporary directory.
const GRZ_TMP_NAME: &str = "grizzly";

/// Returns `<base>/<subdir>`, creating it if needed.
///
/// `<base>` is the value of [`GRZ_TMP_ENV`] when set, otherwise `grizzly` below the
/// system temporary directory.
pub fn grz_tmp<P>(subdir: P) -> Result<PathBuf, Error>
where
    P: AsRef<Path>,
{
    let base = match env::var_os(GRZ_TMP_ENV) {
        Some(base) if !base.is_empty() => PathBuf::from(base),
        _ => env::temp_dir().join(GRZ_TMP_NAME),
    };
    let path = base.join(subdir);
    fs::create_dir_all(&path)?;
    Ok(path)
}

/// Creates a uniquely named directory in the scratch area.
///
/// The directory and everything in it is removed when the returned [`TempDir`] is dropped,
/// no matter how the owning scope is left.
pub fn scratch_dir(prefix: &str, subdir: &str) -> Result<TempDir, Error> {
    let parent = grz_tmp(subdir)?;
    Ok(tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?)
}

/// Creates a uniquely named directory in the scratch area that outlives this process.
///
/// Used for diagnostics the user has to look at after the harness exits.
pub fn persistent_dir(prefix: &str, subdir: &str) -> Result<PathBuf, Error> {
    #[allow(deprecated)]
    let path = scratch_dir(prefix, subdir)?.into_path();
    Ok(path)
}

/// Write a file atomically
///
/// Creates a `.{file_name}.tmp` file, and writes all bytes to it.
/// After all bytes have been written, the tmp-file is moved to it's original `path`.
/// It will overwrite existing files with the same filename.
pub fn write_file_atomic<P>(path: P, bytes: &[u8]) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    fn inner(path: &Path, bytes: &[u8]) -> Result<(), Error> {
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::illegal_argument(format!("{} is not a file", path.display())))?;
        let mut tmpfile_name = path.to_path_buf();
        tmpfile_name.set_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

        let mut tmpfile = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmpfile_name)?;

        tmpfile.write_all(bytes)?;
        fs::rename(&tmpfile_name, path)?;
        Ok(())
    }
    inner(path.as_ref(), bytes)
}
