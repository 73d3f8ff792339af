//! Media storage for post images.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Directory below the media root that holds post images.
pub const POST_IMAGES_DIR: &str = "posts";

const MAX_NAME_ATTEMPTS: u32 = 8;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Path relative to the media root, e.g. `posts/small.gif`.
    pub stored_path: String,
    pub size_bytes: u64,
}

/// Filesystem-backed media storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a post image as `posts/<name>`. When the name is taken a short
    /// random suffix is added to the stem.
    pub async fn store_post_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let filename = sanitize_filename(original_name);
        let mut stored_path = format!("{POST_IMAGES_DIR}/{filename}");
        let mut absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut attempts = 0;
        let mut file = loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&absolute)
                .await
            {
                Ok(file) => break file,
                Err(err)
                    if err.kind() == ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS =>
                {
                    attempts += 1;
                    stored_path = format!("{POST_IMAGES_DIR}/{}", with_random_suffix(&filename));
                    absolute = self.resolve(&stored_path)?;
                }
                Err(err) => return Err(err.into()),
            }
        };

        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        Ok(StoredUpload {
            stored_path,
            size_bytes: data.len() as u64,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::RootDir | Component::Prefix(_)
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

fn with_random_suffix(filename: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..7];
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{filename}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_images_under_posts_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let stored = storage
            .store_post_image("small.gif", Bytes::from_static(b"GIF89a"))
            .await
            .expect("store");
        assert_eq!(stored.stored_path, "posts/small.gif");
        assert_eq!(stored.size_bytes, 6);

        let bytes = storage.read("posts/small.gif").await.expect("read");
        assert_eq!(bytes, Bytes::from_static(b"GIF89a"));
    }

    #[tokio::test]
    async fn name_clash_gets_a_suffix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let first = storage
            .store_post_image("small.gif", Bytes::from_static(b"one"))
            .await
            .expect("store");
        let second = storage
            .store_post_image("small.gif", Bytes::from_static(b"two"))
            .await
            .expect("store");

        assert_ne!(first.stored_path, second.stored_path);
        assert!(second.stored_path.starts_with("posts/small_"));
        assert!(second.stored_path.ends_with(".gif"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_uploads_with_one_name_get_distinct_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = std::sync::Arc::new(
            UploadStorage::new(dir.path().to_path_buf()).expect("storage"),
        );

        let tasks: Vec<_> = (0..8u8)
            .map(|n| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage
                        .store_post_image("race.gif", Bytes::from(vec![n; 16]))
                        .await
                        .expect("store")
                })
            })
            .collect();

        let mut paths = std::collections::HashSet::new();
        for (n, task) in tasks.into_iter().enumerate() {
            let stored = task.await.expect("join");
            let bytes = storage.read(&stored.stored_path).await.expect("read");
            assert_eq!(bytes, Bytes::from(vec![n as u8; 16]));
            assert!(paths.insert(stored.stored_path));
        }
        assert_eq!(paths.len(), 8);
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        assert!(matches!(
            storage.read("../secret").await,
            Err(UploadStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.read("/etc/passwd").await,
            Err(UploadStorageError::InvalidPath)
        ));
    }

    #[test]
    fn filenames_are_slugified() {
        assert_eq!(sanitize_filename("My Photo.PNG"), "my-photo.png");
        assert_eq!(sanitize_filename("../../evil.gif"), "evil.gif");
        assert_eq!(sanitize_filename("!!!"), "upload");
    }
}
