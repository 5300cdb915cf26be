//! Filesystem content store
//!
//! Artifact names are relative paths under a root directory. Hashes are computed from file
//! content at listing time; no metadata is kept beside the files.

use super::{ContentHash, ContentStore, ObjectWriter};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Content store rooted at a local directory
#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an artifact name
    ///
    /// Rejects absolute names and names that would escape the root.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(StoreError::Backend(format!("invalid artifact name {name:?}")));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FsStore {
    async fn open_writer(&self, name: &str) -> Result<ObjectWriter, StoreError> {
        let path = self.path_of(name)?;
        Self::ensure_parent(&path).await?;
        let file = tokio::fs::File::create(&path).await?;
        Ok(Box::new(file))
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let from = self.path_of(src)?;
        let to = self.path_of(dst)?;
        if !tokio::fs::try_exists(&from).await? {
            return Err(StoreError::NotFound(src.to_string()));
        }
        Self::ensure_parent(&to).await?;
        tokio::fs::copy(&from, &to).await?;
        Ok(())
    }

    async fn list_content_hashes(
        &self,
        prefix: &str,
    ) -> Result<HashMap<String, ContentHash>, StoreError> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || hash_matching_files(&root, &prefix))
            .await
            .map_err(|e| StoreError::Backend(format!("hashing task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

/// Walk the deepest directory covering `prefix` and hash every file whose name matches it
fn hash_matching_files(
    root: &Path,
    prefix: &str,
) -> Result<HashMap<String, ContentHash>, StoreError> {
    let dir_part = match prefix.rfind('/') {
        Some(idx) => &prefix[..idx],
        None => "",
    };
    let start = if dir_part.is_empty() {
        root.to_path_buf()
    } else {
        root.join(dir_part)
    };

    let mut hashes = HashMap::new();
    if !start.is_dir() {
        return Ok(hashes);
    }

    for entry in WalkDir::new(&start).follow_links(false) {
        let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = artifact_name(root, entry.path()) else {
            tracing::debug!(path = ?entry.path(), "skipping file with non UTF-8 name");
            continue;
        };
        if name.starts_with(prefix) {
            hashes.insert(name, hash_file(entry.path())?);
        }
    }
    Ok(hashes)
}

fn artifact_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

fn hash_file(path: &Path) -> Result<ContentHash, StoreError> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(context.compute().0)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    async fn write(store: &FsStore, name: &str, content: &[u8]) {
        let mut writer = store.open_writer(name).await.unwrap();
        writer.write_all(content).await.unwrap();
        writer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn write_then_list_reports_md5() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        write(&store, "Maxmind/2024/01/02/a.tar.gz", b"geo").await;

        let hashes = store.list_content_hashes("Maxmind/2024/01/").await.unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(
            hashes["Maxmind/2024/01/02/a.tar.gz"],
            md5::compute(b"geo").0
        );
    }

    #[tokio::test]
    async fn partial_file_prefix_matches_within_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());

        write(&store, "RV/2017/06/routeviews-a.gz", b"a").await;
        write(&store, "RV/2017/06/other-b.gz", b"b").await;

        let hashes = store.list_content_hashes("RV/2017/06/route").await.unwrap();
        assert_eq!(hashes.keys().collect::<Vec<_>>(), vec!["RV/2017/06/routeviews-a.gz"]);
    }

    #[tokio::test]
    async fn missing_prefix_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());
        let hashes = store.list_content_hashes("nothing/here/").await.unwrap();
        assert!(hashes.is_empty());
    }

    #[tokio::test]
    async fn copy_creates_alias_and_delete_removes() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsStore::new(temp_dir.path());
        write(&store, "d/2024/x", b"payload").await;

        store.copy("d/2024/x", "d/current/x").await.unwrap();
        let alias = std::fs::read(temp_dir.path().join("d/current/x")).unwrap();
        assert_eq!(alias, b"payload");

        store.delete("d/2024/x").await.unwrap();
        assert!(!temp_dir.path().join("d/2024/x").exists());
        assert!(matches!(
            store.delete("d/2024/x").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn path_of_rejects_escapes() {
        let store = FsStore::new("/srv/data");
        assert!(store.path_of("../etc/passwd").is_err());
        assert!(store.path_of("/etc/passwd").is_err());
        assert!(store.path_of("").is_err());
        assert_eq!(
            store.path_of("a/b.gz").unwrap(),
            PathBuf::from("/srv/data/a/b.gz")
        );
    }
}
