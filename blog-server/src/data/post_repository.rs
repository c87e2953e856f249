use crate::domain::{CommentRecord, CommentTree, DomainError, Post, PostPatch};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

/// CRUD surface of the relational store. Implementations report every
/// failure; callers decide whether to swallow it (see `PrimaryStore`).
#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts ordered by date, newest first, with comment trees attached.
    async fn fetch_all_posts(&self) -> Result<Vec<Post>, DomainError>;
    /// Creates or replaces the post row and inserts any of its comments the
    /// store does not know yet.
    async fn upsert_post(&self, post: &Post) -> Result<(), DomainError>;
    async fn update_post_fields(&self, id: i64, patch: &PostPatch) -> Result<(), DomainError>;
    /// Removes the post together with its comments and likes.
    async fn delete_post(&self, id: i64) -> Result<(), DomainError>;
    async fn create_comment(&self, comment: &CommentRecord) -> Result<(), DomainError>;
    /// Removes the comment together with all of its replies.
    async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<(), DomainError>;
    async fn set_comment_likes(
        &self,
        post_id: i64,
        comment_id: i64,
        likes: i64,
    ) -> Result<(), DomainError>;
    /// Records a like from `user_ip`. Returns `false` when that address already
    /// liked the post.
    async fn record_like(&self, post_id: i64, user_ip: &str) -> Result<bool, DomainError>;
    /// Wipes every table. Only used by seeding.
    async fn clear_all(&self) -> Result<(), DomainError>;
}

pub struct PostgresPostStore {
    pool: PgPool,
}

impl PostgresPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn post_from_row(row: &PgRow) -> Result<Post, DomainError> {
    Ok(Post {
        id: row.try_get("id")?,
        url_id: row.try_get("url_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        image_url: row.try_get("image_url")?,
        category: row.try_get("category")?,
        tags: row.try_get("tags")?,
        date: row.try_get("date")?,
        views: row.try_get("views")?,
        likes: row.try_get("likes")?,
        active: row.try_get("active")?,
        comments: CommentTree::new(),
    })
}

fn comment_from_row(row: &PgRow) -> Result<CommentRecord, DomainError> {
    Ok(CommentRecord {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        parent_id: row.try_get("parent_id")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        date: row.try_get("date")?,
        likes: row.try_get("likes")?,
    })
}

#[async_trait]
impl PostStore for PostgresPostStore {
    async fn fetch_all_posts(&self) -> Result<Vec<Post>, DomainError> {
        let post_rows = sqlx::query(
            r#"
            SELECT id, url_id, title, description, content, image_url, category,
                   tags, date, views, likes, active
            FROM posts
            ORDER BY date DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let comment_rows = sqlx::query(
            r#"
            SELECT id, post_id, parent_id, author, content, date, likes
            FROM comments
            ORDER BY date ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut comments_by_post: HashMap<i64, Vec<CommentRecord>> = HashMap::new();
        for row in &comment_rows {
            let comment = comment_from_row(row)?;
            comments_by_post
                .entry(comment.post_id)
                .or_default()
                .push(comment);
        }

        let posts = post_rows
            .iter()
            .map(|row| {
                let mut post = post_from_row(row)?;
                if let Some(records) = comments_by_post.remove(&post.id) {
                    post.comments = CommentTree::from_records(records);
                }
                Ok(post)
            })
            .collect::<Result<Vec<Post>, DomainError>>()?;

        tracing::debug!(
            "Fetched {} posts and {} comments from database",
            posts.len(),
            comment_rows.len()
        );

        Ok(posts)
    }

    async fn upsert_post(&self, post: &Post) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, url_id, title, description, content, image_url,
                               category, tags, date, views, likes, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                url_id = EXCLUDED.url_id,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                content = EXCLUDED.content,
                image_url = EXCLUDED.image_url,
                category = EXCLUDED.category,
                tags = EXCLUDED.tags,
                date = EXCLUDED.date,
                views = EXCLUDED.views,
                likes = EXCLUDED.likes,
                active = EXCLUDED.active
            "#,
        )
        .bind(post.id)
        .bind(&post.url_id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(&post.category)
        .bind(&post.tags)
        .bind(post.date)
        .bind(post.views)
        .bind(post.likes)
        .bind(post.active)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert post {}: {}", post.id, e);
            DomainError::from(e)
        })?;

        // Pre-order keeps every parent ahead of its replies for the FK check.
        for comment in post.comments.records_preorder() {
            sqlx::query(
                r#"
                INSERT INTO comments (id, post_id, parent_id, author, content, date, likes)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (post_id, id) DO NOTHING
                "#,
            )
            .bind(comment.id)
            .bind(post.id)
            .bind(comment.parent_id)
            .bind(&comment.author)
            .bind(&comment.content)
            .bind(comment.date)
            .bind(comment.likes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_post_fields(&self, id: i64, patch: &PostPatch) -> Result<(), DomainError> {
        if patch.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE posts
            SET
                url_id = COALESCE($1, url_id),
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                content = COALESCE($4, content),
                image_url = COALESCE($5, image_url),
                category = CASE WHEN $6 THEN $7 ELSE category END,
                tags = COALESCE($8, tags),
                date = COALESCE($9, date),
                active = COALESCE($10, active),
                views = COALESCE($11, views),
                likes = COALESCE($12, likes)
            WHERE id = $13
            "#,
        )
        .bind(&patch.url_id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.content)
        .bind(&patch.image_url)
        .bind(patch.category.is_some())
        .bind(patch.category.clone().flatten())
        .bind(&patch.tags)
        .bind(patch.date)
        .bind(patch.active)
        .bind(patch.views)
        .bind(patch.likes)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(DomainError::PostNotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_post(&self, id: i64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(DomainError::PostNotFound)
        } else {
            Ok(())
        }
    }

    async fn create_comment(&self, comment: &CommentRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, parent_id, author, content, date, likes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.parent_id)
        .bind(&comment.author)
        .bind(&comment.content)
        .bind(comment.date)
        .bind(comment.likes)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create comment {}: {}", comment.id, e);
            DomainError::from(e)
        })?;

        Ok(())
    }

    async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM comments
            WHERE id = $1 AND post_id = $2
            "#,
        )
        .bind(comment_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(DomainError::CommentNotFound)
        } else {
            Ok(())
        }
    }

    async fn set_comment_likes(
        &self,
        post_id: i64,
        comment_id: i64,
        likes: i64,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE comments
            SET likes = $1
            WHERE id = $2 AND post_id = $3
            "#,
        )
        .bind(likes)
        .bind(comment_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(DomainError::CommentNotFound)
        } else {
            Ok(())
        }
    }

    async fn record_like(&self, post_id: i64, user_ip: &str) -> Result<bool, DomainError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO post_likes (post_id, user_ip)
            VALUES ($1, $2)
            ON CONFLICT (post_id, user_ip) DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_ip)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            sqlx::query("UPDATE posts SET likes = likes + 1 WHERE id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn clear_all(&self) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await?;
        for statement in [
            "DELETE FROM post_likes",
            "DELETE FROM comments",
            "DELETE FROM posts",
        ] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::info!("Cleared posts, comments and likes from database");
        Ok(())
    }
}

// Runs against a throwaway database per test; needs DATABASE_URL, e.g.
// `cargo test -p blog-server -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CreatePostRequest;
    use chrono::Utc;

    fn post(id: i64, title: &str, category: Option<&str>) -> Post {
        Post::create(
            id,
            CreatePostRequest {
                title: title.to_string(),
                content: "Body".to_string(),
                category: category.map(str::to_string),
                date: Some(format!("2024-03-{:02}", id)),
                ..CreatePostRequest::default()
            },
            |_| false,
        )
        .unwrap()
    }

    fn comment(post_id: i64, id: i64, parent_id: Option<i64>) -> CommentRecord {
        CommentRecord {
            id,
            post_id,
            parent_id,
            author: "Ann".to_string(),
            content: format!("Comment {id}"),
            date: Utc::now(),
            likes: 0,
        }
    }

    async fn fetch(store: &PostgresPostStore, id: i64) -> Post {
        store
            .fetch_all_posts()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.id == id)
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn upsert_inserts_missing_comments_and_keeps_existing(pool: PgPool) {
        let store = PostgresPostStore::new(pool);
        let mut first = post(1, "First", None);
        first.comments.insert(comment(1, 1, None)).unwrap();
        first.comments.insert(comment(1, 2, Some(1))).unwrap();
        store.upsert_post(&first).await.unwrap();
        store.upsert_post(&post(2, "Second", None)).await.unwrap();

        let ids: Vec<i64> = store
            .fetch_all_posts()
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);

        // Comment ids are scoped per post.
        store.create_comment(&comment(2, 1, None)).await.unwrap();

        let mut renamed = post(1, "First, edited", None);
        renamed.comments.insert(comment(1, 3, None)).unwrap();
        store.upsert_post(&renamed).await.unwrap();

        let stored = fetch(&store, 1).await;
        assert_eq!(stored.title, "First, edited");
        assert_eq!(stored.comments.len(), 3);
        assert_eq!(stored.comments.get(2).unwrap().parent_id, Some(1));
        assert_eq!(fetch(&store, 2).await.comments.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn category_patch_distinguishes_keep_and_clear(pool: PgPool) {
        let store = PostgresPostStore::new(pool);
        store.upsert_post(&post(1, "Post", Some("Rust"))).await.unwrap();

        let retitle = PostPatch {
            title: Some("Renamed".to_string()),
            views: Some(4),
            ..PostPatch::default()
        };
        store.update_post_fields(1, &retitle).await.unwrap();
        let kept = fetch(&store, 1).await;
        assert_eq!(kept.title, "Renamed");
        assert_eq!(kept.views, 4);
        assert_eq!(kept.category.as_deref(), Some("Rust"));

        let clear = PostPatch {
            category: Some(None),
            ..PostPatch::default()
        };
        store.update_post_fields(1, &clear).await.unwrap();
        assert_eq!(fetch(&store, 1).await.category, None);

        let missing = store.update_post_fields(9, &retitle).await;
        assert!(matches!(missing, Err(DomainError::PostNotFound)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn deleting_a_comment_removes_its_replies(pool: PgPool) {
        let store = PostgresPostStore::new(pool);
        store.upsert_post(&post(1, "Post", None)).await.unwrap();
        store.create_comment(&comment(1, 1, None)).await.unwrap();
        store.create_comment(&comment(1, 2, Some(1))).await.unwrap();
        store.create_comment(&comment(1, 3, Some(2))).await.unwrap();
        store.create_comment(&comment(1, 4, None)).await.unwrap();

        store.delete_comment(1, 1).await.unwrap();

        let remaining = fetch(&store, 1).await.comments.ids_preorder();
        assert_eq!(remaining, vec![4]);
        assert!(matches!(
            store.delete_comment(1, 2).await,
            Err(DomainError::CommentNotFound)
        ));

        store.set_comment_likes(1, 4, 3).await.unwrap();
        assert_eq!(fetch(&store, 1).await.comments.get(4).unwrap().likes, 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn likes_are_counted_once_per_address(pool: PgPool) {
        let store = PostgresPostStore::new(pool);
        store.upsert_post(&post(1, "Post", None)).await.unwrap();

        assert!(store.record_like(1, "10.0.0.1").await.unwrap());
        assert!(!store.record_like(1, "10.0.0.1").await.unwrap());
        assert!(store.record_like(1, "10.0.0.2").await.unwrap());
        assert_eq!(fetch(&store, 1).await.likes, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn deleting_a_post_cascades(pool: PgPool) {
        let store = PostgresPostStore::new(pool.clone());
        store.upsert_post(&post(1, "Post", None)).await.unwrap();
        store.create_comment(&comment(1, 1, None)).await.unwrap();
        store.record_like(1, "10.0.0.1").await.unwrap();

        store.delete_post(1).await.unwrap();

        assert!(store.fetch_all_posts().await.unwrap().is_empty());
        let orphans: i64 = sqlx::query(
            "SELECT (SELECT COUNT(*) FROM comments) + (SELECT COUNT(*) FROM post_likes)",
        )
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get(0)
        .unwrap();
        assert_eq!(orphans, 0);
        assert!(matches!(
            store.delete_post(1).await,
            Err(DomainError::PostNotFound)
        ));
    }
}
