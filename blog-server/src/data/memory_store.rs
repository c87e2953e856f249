//! In-memory `PostStore` used by the service and sync tests. It mimics the
//! relational store's cascades and can be switched to "unreachable".

use crate::data::post_repository::PostStore;
use crate::domain::{CommentRecord, DomainError, Post, PostPatch};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub struct InMemoryPostStore {
    posts: Mutex<BTreeMap<i64, Post>>,
    likes: Mutex<HashSet<(i64, String)>>,
    reachable: AtomicBool,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(BTreeMap::new()),
            likes: Mutex::new(HashSet::new()),
            reachable: AtomicBool::new(true),
        }
    }

    pub fn with_posts(posts: Vec<Post>) -> Self {
        let store = Self::new();
        for post in posts {
            store.insert(post);
        }
        store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn insert(&self, post: Post) {
        self.posts.lock().unwrap().insert(post.id, post);
    }

    pub fn get(&self, id: i64) -> Option<Post> {
        self.posts.lock().unwrap().get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.posts.lock().unwrap().keys().copied().collect()
    }

    pub fn comment_count(&self, post_id: i64) -> usize {
        self.get(post_id).map(|p| p.comments.len()).unwrap_or(0)
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DomainError::StoreUnavailable)
        }
    }
}

impl Default for InMemoryPostStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn fetch_all_posts(&self) -> Result<Vec<Post>, DomainError> {
        self.check()?;
        let mut posts: Vec<Post> = self.posts.lock().unwrap().values().cloned().collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn upsert_post(&self, post: &Post) -> Result<(), DomainError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        let mut stored = post.clone();
        if let Some(existing) = posts.get(&post.id) {
            for record in existing.comments.records_preorder() {
                if !stored.comments.contains(record.id) {
                    let _ = stored.comments.insert(record.clone());
                }
            }
        }
        posts.insert(post.id, stored);
        Ok(())
    }

    async fn update_post_fields(&self, id: i64, patch: &PostPatch) -> Result<(), DomainError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        let post = posts.get_mut(&id).ok_or(DomainError::PostNotFound)?;
        patch.apply_to(post);
        Ok(())
    }

    async fn delete_post(&self, id: i64) -> Result<(), DomainError> {
        self.check()?;
        self.posts
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(DomainError::PostNotFound)?;
        self.likes.lock().unwrap().retain(|(post_id, _)| *post_id != id);
        Ok(())
    }

    async fn create_comment(&self, comment: &CommentRecord) -> Result<(), DomainError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .get_mut(&comment.post_id)
            .ok_or_else(|| DomainError::DatabaseError("foreign key violation".into()))?;
        post.comments
            .insert(comment.clone())
            .map_err(|e| DomainError::DatabaseError(e.to_string()))
    }

    async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<(), DomainError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        let post = posts.get_mut(&post_id).ok_or(DomainError::CommentNotFound)?;
        post.comments.remove_subtree(comment_id).map(|_| ())
    }

    async fn set_comment_likes(
        &self,
        post_id: i64,
        comment_id: i64,
        likes: i64,
    ) -> Result<(), DomainError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        let comment = posts
            .get_mut(&post_id)
            .and_then(|p| p.comments.get_mut(comment_id))
            .ok_or(DomainError::CommentNotFound)?;
        comment.likes = likes;
        Ok(())
    }

    async fn record_like(&self, post_id: i64, user_ip: &str) -> Result<bool, DomainError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        let post = posts.get_mut(&post_id).ok_or(DomainError::PostNotFound)?;
        let inserted = self
            .likes
            .lock()
            .unwrap()
            .insert((post_id, user_ip.to_string()));
        if inserted {
            post.likes += 1;
        }
        Ok(inserted)
    }

    async fn clear_all(&self) -> Result<(), DomainError> {
        self.check()?;
        self.posts.lock().unwrap().clear();
        self.likes.lock().unwrap().clear();
        Ok(())
    }
}
