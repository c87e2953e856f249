use crate::domain::Post;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared in-memory post collection read by every request.
///
/// Clones share the same collection. Access goes through synchronous
/// closures, so a mutation always finishes before the task can yield.
#[derive(Debug, Clone, Default)]
pub struct PostCache {
    posts: Arc<RwLock<Vec<Post>>>,
    highest_id: Arc<AtomicI64>,
}

impl PostCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<Post>) -> Self {
        let highest = posts.iter().map(|p| p.id).max().unwrap_or(0);
        Self {
            posts: Arc::new(RwLock::new(posts)),
            highest_id: Arc::new(AtomicI64::new(highest)),
        }
    }

    pub async fn read<R>(&self, f: impl FnOnce(&[Post]) -> R) -> R {
        let posts = self.posts.read().await;
        f(posts.as_slice())
    }

    pub async fn write<R>(&self, f: impl FnOnce(&mut Vec<Post>) -> R) -> R {
        let mut posts = self.posts.write().await;
        f(&mut *posts)
    }

    pub async fn snapshot(&self) -> Vec<Post> {
        self.posts.read().await.clone()
    }

    /// Clears the collection and refills it; never merges.
    pub async fn replace_all(&self, posts: Vec<Post>) {
        self.observe_ids(&posts);
        let mut guard = self.posts.write().await;
        guard.clear();
        guard.extend(posts);
    }

    /// Next post id: one above both the largest id in `posts` and any id this
    /// cache has handed out or seen before, so deleted ids are not reused.
    pub fn next_post_id(&self, posts: &[Post]) -> i64 {
        let max_existing = posts.iter().map(|p| p.id).max().unwrap_or(0);
        let floor = self.highest_id.load(Ordering::SeqCst);
        let id = max_existing.max(floor) + 1;
        self.highest_id.fetch_max(id, Ordering::SeqCst);
        id
    }

    fn observe_ids(&self, posts: &[Post]) {
        if let Some(max) = posts.iter().map(|p| p.id).max() {
            self.highest_id.fetch_max(max, Ordering::SeqCst);
        }
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }
}
