use crate::domain::comment::CommentTree;
use crate::domain::slug::derive_slug;
use crate::domain::DomainError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub url_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub comments: CommentTree,
}

fn default_active() -> bool {
    true
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub url_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub date: Option<String>,
    pub active: Option<bool>,
}

/// Column-level partial update sent to the primary store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub url_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<Option<String>>,
    pub tags: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub active: Option<bool>,
    pub views: Option<i64>,
    pub likes: Option<i64>,
}

impl PostPatch {
    pub fn active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Self::default()
        }
    }

    pub fn likes(likes: i64) -> Self {
        Self {
            likes: Some(likes),
            ..Self::default()
        }
    }

    /// Every admin-editable field of `post`.
    pub fn editable_fields(post: &Post) -> Self {
        Self {
            url_id: Some(post.url_id.clone()),
            title: Some(post.title.clone()),
            description: Some(post.description.clone()),
            content: Some(post.content.clone()),
            image_url: Some(post.image_url.clone()),
            category: Some(post.category.clone()),
            tags: Some(post.tags.clone()),
            date: Some(post.date),
            active: Some(post.active),
            views: None,
            likes: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, post: &mut Post) {
        if let Some(url_id) = &self.url_id {
            post.url_id = url_id.clone();
        }
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(description) = &self.description {
            post.description = description.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(image_url) = &self.image_url {
            post.image_url = image_url.clone();
        }
        if let Some(category) = &self.category {
            post.category = category.clone();
        }
        if let Some(tags) = &self.tags {
            post.tags = tags.clone();
        }
        if let Some(date) = self.date {
            post.date = date;
        }
        if let Some(active) = self.active {
            post.active = active;
        }
        if let Some(views) = self.views {
            post.views = views;
        }
        if let Some(likes) = self.likes {
            post.likes = likes;
        }
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_post_date(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| DomainError::ValidationError(format!("Invalid date: {}", raw)))
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn normalize_tags(tags: &str) -> String {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// First free url id for a post: the slug itself, then `{slug}-{id}`, then
/// `{slug}-{id}-2`, `{slug}-{id}-3` and so on. An empty slug starts from
/// `post-{id}`.
pub fn unique_url_id(slug: &str, id: i64, slug_taken: impl Fn(&str) -> bool) -> String {
    let base = if slug.is_empty() {
        format!("post-{}", id)
    } else {
        slug.to_string()
    };
    if !slug_taken(&base) {
        return base;
    }

    let with_id = if slug.is_empty() {
        base
    } else {
        format!("{}-{}", slug, id)
    };
    if !slug_taken(&with_id) {
        return with_id;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", with_id, n);
        if !slug_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl Post {
    /// Builds a new post from an admin request. `slug_taken` reports whether a
    /// url id is already used by another post; see [`unique_url_id`].
    pub fn create(
        id: i64,
        req: CreatePostRequest,
        slug_taken: impl Fn(&str) -> bool,
    ) -> Result<Self, DomainError> {
        if req.title.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Title cannot be empty".to_string(),
            ));
        }
        let date = match req.date.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => parse_post_date(raw)?,
            None => Utc::now(),
        };

        let url_id = unique_url_id(&derive_slug(&req.title), id, slug_taken);

        Ok(Self {
            id,
            url_id,
            title: req.title.trim().to_string(),
            description: req.description,
            content: req.content,
            image_url: req.image_url,
            category: normalize_category(req.category),
            tags: normalize_tags(&req.tags),
            date,
            views: 0,
            likes: 0,
            active: req.active.unwrap_or(true),
            comments: CommentTree::new(),
        })
    }

    /// Validates the whole request before touching any field, so a rejected
    /// update leaves the post unchanged.
    pub fn apply_update(
        &mut self,
        req: UpdatePostRequest,
        slug_taken: impl Fn(&str) -> bool,
    ) -> Result<(), DomainError> {
        if let Some(title) = &req.title {
            if title.trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "Title cannot be empty".to_string(),
                ));
            }
        }
        let date = req.date.as_deref().map(parse_post_date).transpose()?;
        let url_id = match req.url_id.as_deref() {
            Some(raw) => {
                let slug = derive_slug(raw);
                if slug.is_empty() {
                    return Err(DomainError::ValidationError(
                        "Url id cannot be empty".to_string(),
                    ));
                }
                if slug != self.url_id && slug_taken(&slug) {
                    return Err(DomainError::Conflict(format!(
                        "Url id '{}' is already in use",
                        slug
                    )));
                }
                Some(slug)
            }
            None => None,
        };

        if let Some(url_id) = url_id {
            self.url_id = url_id;
        }
        if let Some(title) = req.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = req.description {
            self.description = description;
        }
        if let Some(content) = req.content {
            self.content = content;
        }
        if let Some(image_url) = req.image_url {
            self.image_url = image_url;
        }
        if let Some(category) = req.category {
            self.category = normalize_category(Some(category));
        }
        if let Some(tags) = req.tags {
            self.tags = normalize_tags(&tags);
        }
        if let Some(date) = date {
            self.date = date;
        }
        if let Some(active) = req.active {
            self.active = active;
        }
        Ok(())
    }

    pub fn tag_list(&self) -> impl Iterator<Item = &str> {
        self.tags.split(',').map(str::trim).filter(|t| !t.is_empty())
    }

    /// Reconciliation compares only the editorial fields; counters and
    /// comments drift independently.
    pub fn diverges_from(&self, other: &Post) -> bool {
        self.title != other.title
            || self.content != other.content
            || self.description != other.description
            || self.active != other.active
    }

    /// Makes every comment point at this post after loading foreign data.
    pub fn adopt_comments(&mut self) {
        let id = self.id;
        self.comments.set_post_id(id);
    }
}
