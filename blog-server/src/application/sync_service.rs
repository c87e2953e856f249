use crate::application::stores::Stores;
use crate::domain::{DomainError, Post};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Which store the cache was filled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadSource {
    Primary,
    Secondary,
    /// Neither store could be read; the cache was left as it was.
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeReport {
    pub source: LoadSource,
    pub total_cache: usize,
    pub pushed_to_store: usize,
    pub comments_pushed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub updated: usize,
    pub added: usize,
    pub created_in_store: usize,
    /// Comments the database lacked on posts it already had.
    pub comments_pushed: usize,
    pub total_cache: usize,
    pub total_store: usize,
    pub store_available: bool,
}

pub struct SyncService {
    stores: Stores,
}

impl SyncService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Refills the cache from the database, or from the data file when the
    /// database is unreachable or empty.
    pub async fn load_posts(&self) -> LoadSource {
        let from_store = self
            .stores
            .primary
            .safe_query("fetch_all_posts", |db| async move { db.fetch_all_posts().await })
            .await;

        if let Some(posts) = from_store.filter(|posts| !posts.is_empty()) {
            tracing::info!("Loaded {} posts from database", posts.len());
            self.stores.cache.replace_all(posts).await;
            return LoadSource::Primary;
        }

        if self.reload_from_file().await {
            LoadSource::Secondary
        } else {
            tracing::warn!(
                "No store could be read; keeping {} cached posts",
                self.stores.cache.len().await
            );
            LoadSource::Cache
        }
    }

    /// Startup load. A reachable database that lacks some of the loaded posts
    /// (first run, or posts written during an outage) gets them pushed.
    pub async fn initialize(&self) -> InitializeReport {
        let source = self.load_posts().await;

        let (mut pushed_to_store, mut comments_pushed) = (0, 0);
        if source != LoadSource::Primary {
            let store_posts = self
                .stores
                .primary
                .safe_query("fetch_all_posts", |db| async move { db.fetch_all_posts().await })
                .await;

            if let Some(store_posts) = store_posts {
                let store_ids: HashSet<i64> = store_posts.iter().map(|p| p.id).collect();
                let (missing, gaps) = self
                    .stores
                    .cache
                    .read(|posts| {
                        let by_id: HashMap<i64, &Post> = posts.iter().map(|p| (p.id, p)).collect();
                        let gaps: Vec<(Post, usize)> = store_posts
                            .into_iter()
                            .filter_map(|mut store_post| {
                                let cached = by_id.get(&store_post.id)?;
                                let carried = carry_offline_comments(&mut store_post, cached);
                                (carried > 0).then_some((store_post, carried))
                            })
                            .collect();
                        let missing: Vec<Post> = posts
                            .iter()
                            .filter(|p| !store_ids.contains(&p.id))
                            .cloned()
                            .collect();
                        (missing, gaps)
                    })
                    .await;
                pushed_to_store = self.push_to_store(missing).await;
                comments_pushed = self.push_comments(gaps).await;
            }
        }

        let report = InitializeReport {
            source,
            total_cache: self.stores.cache.len().await,
            pushed_to_store,
            comments_pushed,
        };
        tracing::info!("Initialization complete: {:?}", report);
        report
    }

    /// Reconciles cache, data file and database. The database wins for ids it
    /// knows; the cache wins for ids the database has never seen, post and
    /// comment ids alike.
    pub async fn sync(&self) -> SyncReport {
        tracing::info!("Starting synchronization");
        self.reload_from_file().await;

        let store_posts = self
            .stores
            .primary
            .safe_query("fetch_all_posts", |db| async move { db.fetch_all_posts().await })
            .await;

        let Some(store_posts) = store_posts else {
            let report = SyncReport {
                total_cache: self.stores.cache.len().await,
                ..SyncReport::default()
            };
            tracing::warn!("Database unreachable, sync used the data file only: {:?}", report);
            return report;
        };

        let total_store = store_posts.len();
        let store_ids: HashSet<i64> = store_posts.iter().map(|p| p.id).collect();

        let (updated, added, missing, gaps) = self
            .stores
            .cache
            .write(|posts| {
                let (mut updated, mut added) = (0, 0);
                let mut gaps = Vec::new();
                for mut store_post in store_posts {
                    match posts.iter_mut().find(|p| p.id == store_post.id) {
                        Some(cached) => {
                            let carried = carry_offline_comments(&mut store_post, cached);
                            if carried > 0 {
                                gaps.push((store_post.clone(), carried));
                            }
                            if cached.diverges_from(&store_post) {
                                tracing::debug!(
                                    "Post {} differs, taking database version",
                                    store_post.id
                                );
                                *cached = store_post;
                                updated += 1;
                            }
                        }
                        None => {
                            posts.push(store_post);
                            added += 1;
                        }
                    }
                }
                let missing: Vec<Post> = posts
                    .iter()
                    .filter(|p| !store_ids.contains(&p.id))
                    .cloned()
                    .collect();
                (updated, added, missing, gaps)
            })
            .await;

        let created_in_store = self.push_to_store(missing).await;
        let comments_pushed = self.push_comments(gaps).await;

        if updated + added > 0 {
            self.stores.save_file("sync").await;
        }

        let report = SyncReport {
            updated,
            added,
            created_in_store,
            comments_pushed,
            total_cache: self.stores.cache.len().await,
            total_store,
            store_available: true,
        };
        tracing::info!("Synchronization complete: {:?}", report);
        report
    }

    /// Replaces the cache with the data file contents. Returns `false` and
    /// leaves the cache alone when the file is missing or unreadable.
    async fn reload_from_file(&self) -> bool {
        match self.stores.file.try_read_all().await {
            Ok(Some(posts)) => {
                tracing::info!("Loaded {} posts from data file", posts.len());
                self.stores.cache.replace_all(posts).await;
                true
            }
            Ok(None) => {
                tracing::info!("Data file {:?} not found", self.stores.file.path());
                false
            }
            Err(e) => {
                tracing::error!("Failed to read data file {:?}: {}", self.stores.file.path(), e);
                false
            }
        }
    }

    async fn push_to_store(&self, posts: Vec<Post>) -> usize {
        let mut created = 0;
        for post in posts {
            let id = post.id;
            let result: Result<(), DomainError> = self
                .stores
                .primary
                .execute("upsert_post", |db| async move { db.upsert_post(&post).await })
                .await;
            match result {
                Ok(()) => {
                    tracing::info!("Post {} created in database", id);
                    created += 1;
                }
                Err(e) => tracing::error!("Failed to create post {} in database: {}", id, e),
            }
        }
        created
    }

    /// Upserts posts carrying comments the database lacks. Returns how many
    /// comments were sent.
    async fn push_comments(&self, gaps: Vec<(Post, usize)>) -> usize {
        let mut pushed = 0;
        for (post, carried) in gaps {
            let id = post.id;
            let result: Result<(), DomainError> = self
                .stores
                .primary
                .execute("upsert_post", |db| async move { db.upsert_post(&post).await })
                .await;
            match result {
                Ok(()) => {
                    tracing::info!("Pushed {} comments of post {} to database", carried, id);
                    pushed += carried;
                }
                Err(e) => tracing::error!("Failed to push comments of post {}: {}", id, e),
            }
        }
        pushed
    }
}

/// Copies into `store_post` the comments of `cached` its tree does not have,
/// parents first. Replies whose parent is gone from the database are left
/// out. Returns how many were copied.
fn carry_offline_comments(store_post: &mut Post, cached: &Post) -> usize {
    let mut carried = 0;
    for record in cached.comments.records_preorder() {
        if store_post.comments.contains(record.id) {
            continue;
        }
        let mut record = record.clone();
        record.post_id = store_post.id;
        if store_post.comments.insert(record).is_ok() {
            carried += 1;
        }
    }
    carried
}
