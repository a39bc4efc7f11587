//! Per-request working area.
//!
//! Every signing operation gets its own private temporary directory:
//!
//! ```text
//! passsign-XXXXXX/        (0700)
//! ├── bundle/             descriptor, assets, manifest.json, signature
//! └── credentials/        exported certificate and key (files 0600)
//! ```
//!
//! The directory is removed when the [`WorkingArea`] is dropped, so it goes
//! away on every exit path including unwinding.

use crate::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BUNDLE_DIR: &str = "bundle";
const CREDENTIALS_DIR: &str = "credentials";

/// Isolated temporary storage for one signing operation.
#[derive(Debug)]
pub struct WorkingArea {
    dir: TempDir,
}

impl WorkingArea {
    /// Create a fresh working area under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("passsign-");
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        restrict_dir(dir.path())?;
        for sub in [BUNDLE_DIR, CREDENTIALS_DIR] {
            let path = dir.path().join(sub);
            fs::create_dir(&path)?;
            restrict_dir(&path)?;
        }

        Ok(Self { dir })
    }

    /// Root of the working area.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory holding the bundle files.
    pub fn bundle_dir(&self) -> PathBuf {
        self.dir.path().join(BUNDLE_DIR)
    }

    /// Directory holding exported credential material.
    pub fn credentials_dir(&self) -> PathBuf {
        self.dir.path().join(CREDENTIALS_DIR)
    }

    /// Write a bundle file and return its path.
    pub fn stage(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.bundle_dir().join(name);
        write_private(&path, data)?;
        Ok(path)
    }

    /// Write secret material readable by the owner only.
    pub fn write_secret(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.credentials_dir().join(name);
        write_private(&path, data)?;
        Ok(path)
    }

    /// Remove the working area, reporting failures.
    pub fn close(self) -> Result<()> {
        Ok(self.dir.close()?)
    }
}

fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

fn restrict_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_and_cleanup() {
        let root = TempDir::new().unwrap();
        let area = WorkingArea::create(Some(root.path())).unwrap();
        let area_path = area.path().to_path_buf();

        assert!(area_path.starts_with(root.path()));
        assert!(area.bundle_dir().is_dir());
        assert!(area.credentials_dir().is_dir());

        let staged = area.stage("pass.json", b"{}").unwrap();
        assert_eq!(fs::read(&staged).unwrap(), b"{}");

        area.close().unwrap();
        assert!(!area_path.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_area() {
        let root = TempDir::new().unwrap();
        let area_path = {
            let area = WorkingArea::create(Some(root.path())).unwrap();
            area.write_secret("pass_key.pem", b"secret").unwrap();
            area.path().to_path_buf()
        };
        assert!(!area_path.exists());
    }

    #[test]
    fn test_areas_are_distinct() {
        let root = TempDir::new().unwrap();
        let first = WorkingArea::create(Some(root.path())).unwrap();
        let second = WorkingArea::create(Some(root.path())).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    #[cfg(unix)]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let area = WorkingArea::create(None).unwrap();
        let secret = area.write_secret("pass_key.pem", b"secret").unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(area.path()), 0o700);
        assert_eq!(mode(&area.credentials_dir()), 0o700);
        assert_eq!(mode(&secret), 0o600);
        assert_eq!(area.credentials_dir().join("pass_key.pem"), secret);
    }
}
