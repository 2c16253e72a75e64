use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::layout::Layout;

/// Handle to the on-disk store. Cheap to clone; all methods take `&self`
/// and rely on the append-only, content-addressed write discipline instead
/// of locks.
#[derive(Debug, Clone)]
pub struct Store {
    pub(crate) layout: Layout,
}

impl Store {
    /// Open (and if necessary initialize) the store under `root`.
    pub async fn open(root: PathBuf) -> Result<Self> {
        let layout = Layout::new(root);

        fs::create_dir_all(layout.tenants_dir()).await?;
        fs::create_dir_all(layout.pending_dir()).await?;
        fs::create_dir_all(layout.inter_conversations_dir()).await?;

        info!(path = %layout.root().display(), "Store opened");

        Ok(Self { layout })
    }

    /// Read a small text file (key material, sealed info blobs), trimmed.
    pub(crate) async fn read_text(&self, path: &Path) -> Result<String> {
        match fs::read_to_string(path).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// List the entry names of a directory; a missing directory is an
    /// empty listing, not an error.
    pub(crate) async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    pub(crate) async fn path_exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Recursive delete that succeeds when the target is already absent.
    pub(crate) async fn remove_dir_idempotent(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn remove_file_idempotent(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
