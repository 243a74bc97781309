use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::timestamp;

pub const PUBLIC_PREFIX: &str = "/uploads";

/// Uploaded binaries on local disk, served back under [`PUBLIC_PREFIX`].
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        info!("Storing uploads in {}", root.display());

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the payload and returns its public locator. Names never reuse the client's file name and
    /// always end in `.pdf`.
    pub async fn save(&self, bytes: &[u8]) -> std::io::Result<String> {
        let name = format!("{}-{}.pdf", timestamp().timestamp_millis(), Uuid::new_v4().simple());

        fs::write(self.root.join(&name), bytes).await?;

        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }

    /// Missing files are not an error, delete stays idempotent.
    pub async fn remove(&self, locator: &str) -> std::io::Result<()> {
        let Some(path) = self.resolve(locator) else {
            warn!("Refusing to remove {locator}, not an upload locator");
            return Ok(());
        };

        match fs::remove_file(path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn resolve(&self, locator: &str) -> Option<PathBuf> {
        let name = locator.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;

        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }

        Some(self.root.join(name))
    }
}
