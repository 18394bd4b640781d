//! Local directory object store.
//!
//! For sites that publish snapshots from a directory served by their own web
//! server. Files are created with `create_new`, so an existing object is
//! never replaced.

use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use url::Url;

use super::{ImageReference, ObjectStore};

pub struct LocalStore {
    dir: PathBuf,
    public_base_url: Option<String>,
}

impl LocalStore {
    /// `public_base_url` prefixes returned references; without it the
    /// reference is a `file://` URL.
    pub fn new(dir: impl Into<PathBuf>, public_base_url: Option<String>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create archive dir {}", dir.display()))?;
        let dir = dir
            .canonicalize()
            .with_context(|| format!("resolve archive dir {}", dir.display()))?;
        Ok(Self {
            dir,
            public_base_url: public_base_url.filter(|base| !base.trim().is_empty()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn reference_for(&self, path: &Path, file_name: &str) -> Result<ImageReference> {
        match &self.public_base_url {
            Some(base) => Ok(ImageReference::new(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                file_name
            ))),
            None => {
                let url = Url::from_file_path(path)
                    .map_err(|_| anyhow!("archive path {} is not absolute", path.display()))?;
                Ok(ImageReference::new(url.to_string()))
            }
        }
    }
}

impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local-dir"
    }

    fn put_public(&mut self, file_name: &str, jpeg: &[u8]) -> Result<ImageReference> {
        if file_name.contains('/') || file_name.contains('\\') || file_name.starts_with('.') {
            return Err(anyhow!("invalid archive file name '{}'", file_name));
        }
        let path = self.dir.join(file_name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("create {}", path.display()))?;
        file.write_all(jpeg)
            .with_context(|| format!("write {}", path.display()))?;
        file.sync_all()
            .with_context(|| format!("sync {}", path.display()))?;
        self.reference_for(&path, file_name)
    }
}
