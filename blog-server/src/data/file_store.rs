use crate::domain::{DomainError, Post};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Whole-collection JSON mirror of the posts, used when the database is
/// unreachable. It never generates ids; it stores whatever the cache holds.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist, `Err` when it exists but
    /// cannot be read or parsed.
    pub async fn try_read_all(&self) -> Result<Option<Vec<Post>>, DomainError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }

        let mut posts: Vec<Post> = serde_json::from_str(&raw)?;
        for post in &mut posts {
            post.adopt_comments();
        }
        Ok(Some(posts))
    }

    /// Never fails: a missing or malformed file reads as an empty collection.
    pub async fn read_all(&self) -> Vec<Post> {
        match self.try_read_all().await {
            Ok(Some(posts)) => {
                tracing::debug!("Loaded {} posts from {:?}", posts.len(), self.path);
                posts
            }
            Ok(None) => {
                tracing::info!("Data file {:?} does not exist yet", self.path);
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Failed to read data file {:?}: {}", self.path, e);
                Vec::new()
            }
        }
    }

    /// Replaces the file with `posts`. Writes a temporary sibling first and
    /// renames it over the target so readers never see a partial file.
    pub async fn write_all(&self, posts: &[Post]) -> Result<(), DomainError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        let content = serde_json::to_string_pretty(posts)?;
        let tmp_path = dir.join(format!(".posts-{}.tmp", Uuid::new_v4()));

        fs::write(&tmp_path, content).await?;
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Saved {} posts to {:?}", posts.len(), self.path);
        Ok(())
    }
}
