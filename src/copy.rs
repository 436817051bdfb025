//! File-copying steps of the build: mirroring directory trees (assets, the
//! admin panel), copying whitelisted root files and optional single files.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions of root-level files that are published as-is.
pub const ROOT_FILE_EXTENSIONS: &[&str] = &["html", "css", "js", "json", "xml", "txt"];

/// Makes `dst` an exact copy of `src`. Whatever `dst` held before is deleted
/// first, so files that no longer exist in `src` don't survive. Symbolic links
/// are followed. Returns the number of files copied.
///
/// Fails with [`Error::Overlap`] if either directory contains the other.
pub fn mirror_dir(src: &Path, dst: &Path) -> Result<usize> {
    check_disjoint(src, dst)?;
    rmdir(dst)?;
    fs::create_dir_all(dst).map_err(|err| Error::io(dst, err))?;

    let mut copied = 0;
    for result in WalkDir::new(src).follow_links(true).min_depth(1) {
        let entry = result?;
        // strip_prefix shouldn't fail since `src` is always an ancestor of
        // the entry
        let relative = entry.path().strip_prefix(src).unwrap_or_else(|_| entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| Error::io(&target, err))?;
        } else {
            log::debug!("copying {} to {}", entry.path().display(), target.display());
            fs::copy(entry.path(), &target).map_err(|err| Error::io(entry.path(), err))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Empties `dst` (creating it if needed) so that it mirrors a missing source.
pub fn reset_dir(dst: &Path) -> Result<()> {
    rmdir(dst)?;
    fs::create_dir_all(dst).map_err(|err| Error::io(dst, err))
}

/// Copies the regular files directly inside `src` whose extension is one of
/// `extensions` into `dst`, overwriting existing files. Returns the number of
/// files copied.
pub fn copy_root_files(src: &Path, dst: &Path, extensions: &[&str]) -> Result<usize> {
    let mut entries = fs::read_dir(src)
        .map_err(|err| Error::io(src, err))?
        .collect::<io::Result<Vec<_>>>()
        .map_err(|err| Error::io(src, err))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut copied = 0;
    for entry in entries {
        let path = entry.path();
        let whitelisted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| extensions.contains(&ext));
        if whitelisted && path.is_file() {
            let target = dst.join(entry.file_name());
            log::debug!("copying {} to {}", path.display(), target.display());
            fs::copy(&path, &target).map_err(|err| Error::io(&path, err))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copies `src` to `dst` if `src` is a file. Returns whether it was copied.
pub fn copy_file_if_present(src: &Path, dst: &Path) -> Result<bool> {
    if !src.is_file() {
        return Ok(false);
    }
    fs::copy(src, dst).map_err(|err| Error::io(src, err))?;
    Ok(true)
}

fn check_disjoint(src: &Path, dst: &Path) -> Result<()> {
    let src = src.canonicalize().map_err(|err| Error::io(src, err))?;
    let dst = match dst.canonicalize() {
        Ok(dst) => dst,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(Error::io(dst, err)),
    };
    if src.starts_with(&dst) || dst.starts_with(&src) {
        return Err(Error::Overlap { src, dst });
    }
    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

/// Represents the result of a copy operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error copying files.
#[derive(Debug)]
pub enum Error {
    /// Returned when a destination directory can't be removed.
    Clean { path: PathBuf, err: io::Error },

    /// Returned for I/O problems on a specific path.
    Io { path: PathBuf, err: io::Error },

    /// Returned when a mirror's source and destination contain one another.
    Overlap { src: PathBuf, dst: PathBuf },

    /// Returned for errors walking a source directory.
    WalkDir(walkdir::Error),
}

impl Error {
    fn io(path: &Path, err: io::Error) -> Error {
        Error::Io {
            path: path.to_owned(),
            err,
        }
    }
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::Io { path, err } => write!(f, "Copying '{}': {}", path.display(), err),
            Error::Overlap { src, dst } => write!(
                f,
                "Refusing to mirror '{}' into '{}': the directories overlap",
                src.display(),
                dst.display()
            ),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Clean { path: _, err } => Some(err),
            Error::Io { path: _, err } => Some(err),
            Error::Overlap { .. } => None,
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator while walking directories.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_mirror_removes_stale_files() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("assets");
        let dst = dir.path().join("out/assets");
        write(&src.join("css/site.css"), "body {}");
        write(&src.join("logo.svg"), "<svg/>");
        write(&dst.join("stale.js"), "old");
        write(&dst.join("css/old.css"), "old");
        write(&dst.join("css/site.css"), "outdated");

        assert_eq!(2, mirror_dir(&src, &dst)?);

        assert_eq!("body {}", fs::read_to_string(dst.join("css/site.css")).unwrap());
        assert_eq!("<svg/>", fs::read_to_string(dst.join("logo.svg")).unwrap());
        assert!(!dst.join("stale.js").exists());
        assert!(!dst.join("css/old.css").exists());
        Ok(())
    }

    #[test]
    fn test_mirror_copies_empty_directories() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("admin");
        fs::create_dir_all(src.join("js/empty")).unwrap();
        let dst = dir.path().join("out/admin");
        assert_eq!(0, mirror_dir(&src, &dst)?);
        assert!(dst.join("js/empty").is_dir());
        Ok(())
    }

    #[test]
    fn test_mirror_refuses_overlapping_directories() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("assets");
        write(&src.join("css/site.css"), "body {}");

        for dst in [src.clone(), dir.path().to_owned(), src.join("css")] {
            match mirror_dir(&src, &dst) {
                Err(Error::Overlap { .. }) => {}
                other => panic!("unexpected result for {}: {:?}", dst.display(), other),
            }
        }
        assert_eq!("body {}", fs::read_to_string(src.join("css/site.css")).unwrap());
    }

    #[test]
    fn test_reset_dir() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("assets");
        write(&dst.join("stale.txt"), "old");
        reset_dir(&dst)?;
        assert!(dst.is_dir());
        assert_eq!(0, fs::read_dir(&dst).unwrap().count());
        Ok(())
    }

    #[test]
    fn test_copy_root_files_whitelist() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("project");
        let dst = dir.path().join("out");
        write(&src.join("index.html"), "<html/>");
        write(&src.join("robots.txt"), "User-agent: *");
        write(&src.join("build.py"), "print()");
        write(&src.join("_config.yml"), "title: x");
        fs::create_dir_all(src.join("nested.json")).unwrap();
        fs::create_dir_all(&dst).unwrap();

        assert_eq!(2, copy_root_files(&src, &dst, ROOT_FILE_EXTENSIONS)?);
        assert!(dst.join("index.html").is_file());
        assert!(dst.join("robots.txt").is_file());
        assert!(!dst.join("build.py").exists());
        assert!(!dst.join("_config.yml").exists());
        assert!(!dst.join("nested.json").exists());
        Ok(())
    }

    #[test]
    fn test_copy_file_if_present() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("diary.html");
        let dst = dir.path().join("out.html");
        assert!(!copy_file_if_present(&src, &dst)?);
        write(&src, "diary");
        assert!(copy_file_if_present(&src, &dst)?);
        assert_eq!("diary", fs::read_to_string(&dst).unwrap());
        Ok(())
    }
}
