use crate::application::stores::{Persisted, Stores};
use crate::domain::{Comment, CommentRecord, DomainError, LikeAction, NewComment};
use chrono::Utc;

pub struct CommentService {
    stores: Stores,
}

impl CommentService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Top-level comments of the post with their replies nested.
    pub async fn list(&self, post_id: i64) -> Result<Vec<Comment>, DomainError> {
        self.stores
            .cache
            .read(|posts| {
                posts
                    .iter()
                    .find(|p| p.id == post_id)
                    .map(|p| p.comments.to_nested())
            })
            .await
            .ok_or(DomainError::PostNotFound)
    }

    pub async fn add(
        &self,
        post_id: i64,
        new_comment: NewComment,
    ) -> Result<Persisted<Comment>, DomainError> {
        new_comment.validate()?;

        let record = self
            .stores
            .cache
            .write(|posts| -> Result<CommentRecord, DomainError> {
                let post = posts
                    .iter_mut()
                    .find(|p| p.id == post_id)
                    .ok_or(DomainError::PostNotFound)?;
                if let Some(parent_id) = new_comment.parent_id {
                    if !post.comments.contains(parent_id) {
                        return Err(DomainError::ParentCommentNotFound);
                    }
                }

                let now = Utc::now();
                let record = CommentRecord {
                    id: post.comments.next_comment_id(now.timestamp_millis()),
                    post_id,
                    parent_id: new_comment.parent_id,
                    author: new_comment.author.trim().to_string(),
                    content: new_comment.content.trim().to_string(),
                    date: now,
                    likes: 0,
                };
                post.comments.insert(record.clone())?;
                Ok(record)
            })
            .await?;

        tracing::info!(
            "Comment added: post_id={}, comment_id={}, parent_id={:?}",
            post_id,
            record.id,
            record.parent_id
        );

        let stored = record.clone();
        let primary = self
            .stores
            .primary
            .write("create_comment", |db| async move {
                db.create_comment(&stored).await
            })
            .await;
        let secondary = self.stores.save_file("create_comment").await;

        let comment = Comment {
            id: record.id,
            post_id: record.post_id,
            parent_id: record.parent_id,
            author: record.author,
            content: record.content,
            date: record.date,
            likes: record.likes,
            replies: Vec::new(),
        };
        Ok(Persisted::new(comment, primary, secondary, "create_comment"))
    }

    /// Deletes the comment and every reply below it. Returns the removed ids,
    /// the requested one first.
    pub async fn remove(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Persisted<Vec<i64>>, DomainError> {
        let removed = self
            .stores
            .cache
            .write(|posts| {
                let post = posts
                    .iter_mut()
                    .find(|p| p.id == post_id)
                    .ok_or(DomainError::PostNotFound)?;
                post.comments.remove_subtree(comment_id)
            })
            .await?;

        tracing::info!(
            "Comment deleted: post_id={}, comment_id={}, removed={}",
            post_id,
            comment_id,
            removed.len()
        );

        let primary = self
            .stores
            .primary
            .write("delete_comment", |db| async move {
                db.delete_comment(post_id, comment_id).await
            })
            .await;
        let secondary = self.stores.save_file("delete_comment").await;

        Ok(Persisted::new(removed, primary, secondary, "delete_comment"))
    }

    /// Applies a like or unlike and returns the new count, never below zero.
    pub async fn like_toggle(
        &self,
        post_id: i64,
        comment_id: i64,
        action: LikeAction,
    ) -> Result<Persisted<i64>, DomainError> {
        let likes = self
            .stores
            .cache
            .write(|posts| {
                let comment = posts
                    .iter_mut()
                    .find(|p| p.id == post_id)
                    .ok_or(DomainError::PostNotFound)?
                    .comments
                    .get_mut(comment_id)
                    .ok_or(DomainError::CommentNotFound)?;
                comment.likes = action.apply(comment.likes);
                Ok::<_, DomainError>(comment.likes)
            })
            .await?;

        let primary = self
            .stores
            .primary
            .write("set_comment_likes", |db| async move {
                db.set_comment_likes(post_id, comment_id, likes).await
            })
            .await;
        let secondary = self.stores.save_file("set_comment_likes").await;

        Ok(Persisted::new(likes, primary, secondary, "set_comment_likes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory_store::InMemoryPostStore;
    use crate::data::{JsonFileStore, PostCache, PrimaryStore, StoreWrite};
    use crate::domain::{CreatePostRequest, Post};
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(id: i64, parent_id: Option<i64>) -> CommentRecord {
        CommentRecord {
            id,
            post_id: 1,
            parent_id,
            author: format!("author-{id}"),
            content: format!("comment {id}"),
            date: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
            likes: 0,
        }
    }

    /// Post 1 with comments 1 → 3 → 4 and 1 → 5, plus a separate root 2.
    fn seeded_post() -> Post {
        let mut post = Post::create(
            1,
            CreatePostRequest {
                title: "Threads".into(),
                ..CreatePostRequest::default()
            },
            |_| false,
        )
        .unwrap();
        for r in [
            record(1, None),
            record(2, None),
            record(3, Some(1)),
            record(4, Some(3)),
            record(5, Some(1)),
        ] {
            post.comments.insert(r).unwrap();
        }
        post
    }

    struct Fixture {
        service: CommentService,
        stores: Stores,
        db: Arc<InMemoryPostStore>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let post = seeded_post();
        let db = Arc::new(InMemoryPostStore::with_posts(vec![post.clone()]));
        let stores = Stores::new(
            PostCache::with_posts(vec![post]),
            PrimaryStore::new(db.clone()),
            JsonFileStore::new(dir.path().join("posts.json")),
        );
        Fixture {
            service: CommentService::new(stores.clone()),
            stores,
            db,
            _dir: dir,
        }
    }

    fn new_comment(parent_id: Option<i64>) -> NewComment {
        NewComment {
            author: " Reader ".into(),
            content: "Nice post".into(),
            parent_id,
        }
    }

    #[tokio::test]
    async fn reply_lands_under_its_parent() {
        let f = fixture();

        let added = f.service.add(1, new_comment(Some(3))).await.unwrap();

        assert!(added.persistence.is_complete());
        let reply = added.into_value();
        assert_eq!(reply.parent_id, Some(3));
        assert_eq!(reply.author, "Reader");

        let tree = f.service.list(1).await.unwrap();
        let three = &tree[0].replies[0];
        assert_eq!(three.id, 3);
        let reply_ids: Vec<i64> = three.replies.iter().map(|c| c.id).collect();
        assert_eq!(reply_ids, vec![4, reply.id]);
        assert_eq!(three.replies[1].parent_id, Some(3));

        assert!(f.db.get(1).unwrap().comments.contains(reply.id));
        let saved = f.stores.file.read_all().await;
        assert!(saved[0].comments.contains(reply.id));
    }

    #[tokio::test]
    async fn generated_ids_skip_existing_ones() {
        let f = fixture();

        let first = f.service.add(1, new_comment(None)).await.unwrap().into_value();
        let second = f.service.add(1, new_comment(None)).await.unwrap().into_value();

        assert_ne!(first.id, second.id);
        let ids = f.stores.cache.read(|posts| posts[0].comments.ids_preorder()).await;
        assert_eq!(ids.len(), 7);
    }

    #[tokio::test]
    async fn invalid_comments_are_rejected_before_mutation() {
        let f = fixture();

        let blank = NewComment {
            author: "   ".into(),
            content: "text".into(),
            parent_id: None,
        };
        assert!(matches!(
            f.service.add(1, blank).await,
            Err(DomainError::ValidationError(_))
        ));
        assert!(matches!(
            f.service.add(1, new_comment(Some(99))).await,
            Err(DomainError::ParentCommentNotFound)
        ));
        assert!(matches!(
            f.service.add(42, new_comment(None)).await,
            Err(DomainError::PostNotFound)
        ));

        assert_eq!(f.db.comment_count(1), 5);
        assert!(f.stores.file.try_read_all().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn removing_a_comment_cascades_to_all_replies() {
        let f = fixture();

        let removed = f.service.remove(1, 1).await.unwrap();

        assert!(removed.persistence.is_complete());
        assert_eq!(removed.value, vec![1, 3, 4, 5]);
        let remaining = f.stores.cache.read(|posts| posts[0].comments.ids_preorder()).await;
        assert_eq!(remaining, vec![2]);
        assert_eq!(f.db.comment_count(1), 1);

        assert!(matches!(
            f.service.remove(1, 3).await,
            Err(DomainError::CommentNotFound)
        ));
    }

    #[tokio::test]
    async fn likes_never_go_negative() {
        let f = fixture();

        let liked = f.service.like_toggle(1, 4, LikeAction::Like).await.unwrap();
        assert_eq!(liked.value, 1);
        f.service.like_toggle(1, 4, LikeAction::Unlike).await.unwrap();
        let floored = f.service.like_toggle(1, 4, LikeAction::Unlike).await.unwrap();
        assert_eq!(floored.value, 0);
        assert_eq!(f.db.get(1).unwrap().comments.get(4).unwrap().likes, 0);

        assert!(matches!(
            f.service.like_toggle(1, 77, LikeAction::Like).await,
            Err(DomainError::CommentNotFound)
        ));
    }

    #[tokio::test]
    async fn comments_survive_database_outage() {
        let f = fixture();
        f.db.set_reachable(false);

        let added = f.service.add(1, new_comment(None)).await.unwrap();

        assert_eq!(added.persistence.primary, StoreWrite::Unavailable);
        assert!(added.persistence.secondary.is_written());
        assert_eq!(f.service.list(1).await.unwrap().len(), 3);
        assert_eq!(f.db.comment_count(1), 5);
    }
}
