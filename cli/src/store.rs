//! Result-directory file store: gates writes on the `WRITABLE` sentinel
//! file (spec.md §6).

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_writable(&self) -> bool {
        self.root.join("WRITABLE").is_file()
    }

    fn require_writable(&self) -> io::Result<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("result store `{}` has no WRITABLE sentinel", self.root.display()),
            ))
        }
    }

    pub fn read_json<T: DeserializeOwned>(&self, relative: &str) -> io::Result<T> {
        let path = self.root.join(relative);
        let file = fs::File::open(&path)?;
        serde_json::from_reader(file).map_err(io::Error::from)
    }

    pub fn write_json<T: Serialize>(&self, relative: &str, value: &T) -> io::Result<()> {
        self.require_writable()?;
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, value).map_err(io::Error::from)
    }

    pub fn write_bytes(&self, relative: &str, data: &[u8]) -> io::Result<()> {
        self.require_writable()?;
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)
    }
}
