use crate::application::catalog::{self, HistoryItem, NamedCount, PostFilter};
use crate::application::stores::{Persisted, Stores};
use crate::data::StoreWrite;
use crate::domain::{CreatePostRequest, DomainError, Post, PostPatch, UpdatePostRequest};

pub struct BlogService {
    stores: Stores,
}

impl BlogService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Admin listing. The database is the freshest source when reachable;
    /// otherwise the cache is served, loaded from the data file if empty.
    pub async fn get_all(&self) -> Vec<Post> {
        let from_store = self
            .stores
            .primary
            .safe_query("fetch_all_posts", |db| async move { db.fetch_all_posts().await })
            .await;

        if let Some(posts) = from_store.filter(|posts| !posts.is_empty()) {
            tracing::debug!("Serving {} posts from database", posts.len());
            return posts;
        }

        if self.stores.cache.is_empty().await {
            let posts = self.stores.file.read_all().await;
            tracing::info!("Loaded {} posts from data file as fallback", posts.len());
            self.stores.cache.replace_all(posts).await;
        }

        let mut posts = self.stores.cache.snapshot().await;
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        posts
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, DomainError> {
        self.stores
            .cache
            .read(|posts| posts.iter().find(|p| p.id == id).cloned())
            .await
            .ok_or(DomainError::PostNotFound)
    }

    pub async fn list_public(&self, filter: &PostFilter) -> Vec<Post> {
        self.stores
            .cache
            .read(|posts| catalog::public_posts(posts, filter))
            .await
    }

    pub async fn get_public_by_url_id(&self, url_id: &str) -> Result<Post, DomainError> {
        self.stores
            .cache
            .read(|posts| {
                posts
                    .iter()
                    .find(|p| p.active && p.url_id == url_id)
                    .cloned()
            })
            .await
            .ok_or(DomainError::PostNotFound)
    }

    pub async fn categories(&self) -> Vec<NamedCount> {
        self.stores.cache.read(catalog::categories).await
    }

    pub async fn tags(&self) -> Vec<NamedCount> {
        self.stores.cache.read(catalog::tags).await
    }

    pub async fn history(&self) -> Vec<HistoryItem> {
        self.stores.cache.read(catalog::history).await
    }

    /// Counts a public page view and returns the post with the new count.
    pub async fn record_view(&self, url_id: &str) -> Result<Persisted<Post>, DomainError> {
        let post = self
            .stores
            .cache
            .write(|posts| {
                let post = posts
                    .iter_mut()
                    .find(|p| p.active && p.url_id == url_id)
                    .ok_or(DomainError::PostNotFound)?;
                post.views += 1;
                Ok::<_, DomainError>(post.clone())
            })
            .await?;

        let (id, views) = (post.id, post.views);
        let primary = self
            .stores
            .primary
            .write("record_view", |db| async move {
                let patch = PostPatch {
                    views: Some(views),
                    ..PostPatch::default()
                };
                db.update_post_fields(id, &patch).await
            })
            .await;
        let secondary = self.stores.save_file("record_view").await;

        Ok(Persisted::new(post, primary, secondary, "record_view"))
    }

    /// Records a post like once per address. Without a database the address
    /// cannot be checked, so every like counts.
    pub async fn like_post(&self, id: i64, user_ip: &str) -> Result<Persisted<i64>, DomainError> {
        self.get_by_id(id).await?;

        let user_ip = user_ip.to_string();
        let recorded = self
            .stores
            .primary
            .execute("record_like", |db| async move {
                db.record_like(id, &user_ip).await
            })
            .await;

        let (newly_liked, primary) = match recorded {
            Ok(inserted) => (inserted, StoreWrite::Written),
            Err(e) => {
                tracing::warn!("Could not record like for post {} in database: {}", id, e);
                (true, StoreWrite::from_result::<()>(Err(e)))
            }
        };

        let likes = self
            .stores
            .cache
            .write(|posts| {
                let post = posts
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or(DomainError::PostNotFound)?;
                if newly_liked {
                    post.likes += 1;
                }
                Ok::<_, DomainError>(post.likes)
            })
            .await?;

        let secondary = if newly_liked {
            self.stores.save_file("like_post").await
        } else {
            StoreWrite::Skipped
        };

        Ok(Persisted::new(likes, primary, secondary, "like_post"))
    }

    pub async fn create(&self, req: CreatePostRequest) -> Result<Persisted<Post>, DomainError> {
        let cache = &self.stores.cache;
        let post = cache
            .write(|posts| {
                let id = cache.next_post_id(posts);
                let post = Post::create(id, req, |slug| posts.iter().any(|p| p.url_id == slug))?;
                posts.push(post.clone());
                Ok::<_, DomainError>(post)
            })
            .await?;

        tracing::info!("Post created: id={}, url_id={}", post.id, post.url_id);

        let stored = post.clone();
        let primary = self
            .stores
            .primary
            .write("create_post", |db| async move { db.upsert_post(&stored).await })
            .await;
        let secondary = self.stores.save_file("create_post").await;

        Ok(Persisted::new(post, primary, secondary, "create_post"))
    }

    pub async fn update(
        &self,
        id: i64,
        req: UpdatePostRequest,
    ) -> Result<Persisted<Post>, DomainError> {
        let post = self
            .stores
            .cache
            .write(|posts| {
                let taken: Vec<String> = posts
                    .iter()
                    .filter(|p| p.id != id)
                    .map(|p| p.url_id.clone())
                    .collect();
                let post = posts
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or(DomainError::PostNotFound)?;
                post.apply_update(req, |slug| taken.iter().any(|t| t == slug))?;
                Ok::<_, DomainError>(post.clone())
            })
            .await?;

        tracing::info!("Post updated: id={}", id);

        let stored = post.clone();
        let primary = self
            .stores
            .primary
            .write("update_post", |db| async move {
                let patch = PostPatch::editable_fields(&stored);
                match db.update_post_fields(id, &patch).await {
                    // Created while the database was down: push the whole post.
                    Err(DomainError::PostNotFound) => db.upsert_post(&stored).await,
                    other => other,
                }
            })
            .await;
        let secondary = self.stores.save_file("update_post").await;

        Ok(Persisted::new(post, primary, secondary, "update_post"))
    }

    pub async fn delete(&self, id: i64) -> Result<Persisted<Post>, DomainError> {
        let removed = self
            .stores
            .cache
            .write(|posts| {
                let index = posts
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or(DomainError::PostNotFound)?;
                Ok::<_, DomainError>(posts.remove(index))
            })
            .await?;

        tracing::info!(
            "Post deleted: id={} with {} comments",
            id,
            removed.comments.len()
        );

        let primary = self
            .stores
            .primary
            .write("delete_post", |db| async move { db.delete_post(id).await })
            .await;
        let secondary = self.stores.save_file("delete_post").await;

        Ok(Persisted::new(removed, primary, secondary, "delete_post"))
    }

    /// Flips visibility and returns the new `active` value.
    pub async fn toggle_active(&self, id: i64) -> Result<Persisted<bool>, DomainError> {
        let active = self
            .stores
            .cache
            .write(|posts| {
                let post = posts
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or(DomainError::PostNotFound)?;
                post.active = !post.active;
                Ok::<_, DomainError>(post.active)
            })
            .await?;

        tracing::info!("Post status toggled: id={}, active={}", id, active);

        let primary = self
            .stores
            .primary
            .write("toggle_active", |db| async move {
                db.update_post_fields(id, &PostPatch::active(active)).await
            })
            .await;
        let secondary = self.stores.save_file("toggle_active").await;

        Ok(Persisted::new(active, primary, secondary, "toggle_active"))
    }
}
