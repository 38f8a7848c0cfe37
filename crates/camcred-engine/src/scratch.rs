use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use camcred_core::errors::SignError;

/// Attempts at finding a free scratch name before giving up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Directory that holds in-flight signing outputs.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    dir: PathBuf,
}

impl ScratchArea {
    /// Use `configured`, or `<user cache dir>/camcred`, creating it if needed.
    pub fn resolve(configured: Option<&Path>) -> Result<Self, SignError> {
        let dir = match configured {
            Some(dir) => dir.to_path_buf(),
            None => dirs::cache_dir()
                .map(|cache| cache.join("camcred"))
                .ok_or_else(|| SignError::ScratchUnavailable {
                    path: PathBuf::new(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no user cache directory"),
                })?,
        };

        fs::create_dir_all(&dir).map_err(|source| SignError::ScratchUnavailable {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Exclusively create a scratch file named `title`.
    ///
    /// If another call already holds that name, a random suffix is inserted
    /// before the extension. The returned handle is open for read and write.
    pub fn create(&self, title: &str) -> Result<(ScratchArtifact, File), SignError> {
        if Path::new(title).file_name().and_then(|n| n.to_str()) != Some(title) {
            return Err(self.unavailable(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("title {title:?} is not a plain file name"),
            )));
        }

        let mut last_err = None;
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                title.to_string()
            } else {
                suffixed(title)
            };
            let path = self.dir.join(&name);
            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => {
                    tracing::debug!(path = %path.display(), "scratch artifact created");
                    return Ok((ScratchArtifact::new(path), file));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(self.unavailable(e)),
            }
        }
        Err(self.unavailable(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AlreadyExists, "no free scratch name")
        })))
    }

    fn unavailable(&self, source: io::Error) -> SignError {
        SignError::ScratchUnavailable {
            path: self.dir.clone(),
            source,
        }
    }
}

fn suffixed(title: &str) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    let token = &token[..12];
    match title.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{token}.{ext}"),
        None => format!("{title}_{token}"),
    }
}

/// A scratch file owned by one signing call.
///
/// Removed when dropped unless [`adopt`](Self::adopt)ed.
#[derive(Debug)]
pub struct ScratchArtifact {
    path: PathBuf,
    adopted: bool,
}

impl ScratchArtifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            adopted: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole artifact back from disk.
    pub fn read_back(&self) -> Result<Vec<u8>, SignError> {
        fs::read(&self.path).map_err(|source| SignError::Readback {
            path: self.path.clone(),
            source,
        })
    }

    /// Keep the file on disk and hand its path to the caller.
    pub fn adopt(mut self) -> PathBuf {
        self.adopted = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        if self.adopted {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "scratch artifact removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "cannot remove scratch artifact"
            ),
        }
    }
}
