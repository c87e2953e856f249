use crate::domain::Post;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    pub year: i32,
    pub month: u32,
    pub count: usize,
}

/// Public listing filters. Every filter is optional and they combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    #[serde(alias = "q")]
    pub search: Option<String>,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        if let Some(category) = &self.category {
            if post.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !post.tag_list().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if post.date.year() != year {
                return false;
            }
        }
        if let Some(month) = self.month {
            if post.date.month() != month {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = [&post.title, &post.description, &post.content]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Active posts matching `filter`, newest first.
pub fn public_posts(posts: &[Post], filter: &PostFilter) -> Vec<Post> {
    let mut visible: Vec<Post> = posts
        .iter()
        .filter(|p| p.active && filter.matches(p))
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.date.cmp(&a.date));
    visible
}

pub fn categories(posts: &[Post]) -> Vec<NamedCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for category in posts
        .iter()
        .filter(|p| p.active)
        .filter_map(|p| p.category.as_deref())
    {
        *counts.entry(category).or_default() += 1;
    }
    into_named(counts)
}

pub fn tags(posts: &[Post]) -> Vec<NamedCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for tag in posts.iter().filter(|p| p.active).flat_map(|p| p.tag_list()) {
        *counts.entry(tag).or_default() += 1;
    }
    into_named(counts)
}

/// Post counts per year and month, most recent first.
pub fn history(posts: &[Post]) -> Vec<HistoryItem> {
    let mut counts: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for post in posts.iter().filter(|p| p.active) {
        *counts
            .entry((post.date.year(), post.date.month()))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .rev()
        .map(|((year, month), count)| HistoryItem { year, month, count })
        .collect()
}

fn into_named(counts: BTreeMap<&str, usize>) -> Vec<NamedCount> {
    counts
        .into_iter()
        .map(|(name, count)| NamedCount {
            name: name.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CreatePostRequest;

    fn post(id: i64, category: &str, tags: &str, date: &str, active: bool) -> Post {
        Post::create(
            id,
            CreatePostRequest {
                title: format!("Post number {id}"),
                content: if id == 2 { "Tokio runtime internals".into() } else { String::new() },
                category: Some(category.to_string()),
                tags: tags.to_string(),
                date: Some(date.to_string()),
                active: Some(active),
                ..CreatePostRequest::default()
            },
            |_| false,
        )
        .unwrap()
    }

    fn sample() -> Vec<Post> {
        vec![
            post(1, "React", "web, ui", "2024-01-10", true),
            post(2, "Rust", "async,web", "2024-03-05", true),
            post(3, "React", "ui", "2024-03-20", true),
            post(4, "DevOps", "ci", "2023-12-01", false),
            post(5, "", "", "2024-03-22", true),
        ]
    }

    #[test]
    fn categories_count_active_posts_only() {
        assert_eq!(
            categories(&sample()),
            vec![
                NamedCount {
                    name: "React".into(),
                    count: 2,
                },
                NamedCount {
                    name: "Rust".into(),
                    count: 1,
                },
            ]
        );
    }

    #[test]
    fn tags_are_trimmed_and_sorted() {
        let names: Vec<(String, usize)> =
            tags(&sample()).into_iter().map(|t| (t.name, t.count)).collect();
        assert_eq!(
            names,
            vec![("async".into(), 1), ("ui".into(), 2), ("web".into(), 2)]
        );
    }

    #[test]
    fn history_is_most_recent_first() {
        assert_eq!(
            history(&sample()),
            vec![
                HistoryItem {
                    year: 2024,
                    month: 3,
                    count: 3,
                },
                HistoryItem {
                    year: 2024,
                    month: 1,
                    count: 1,
                },
            ]
        );
    }

    #[test]
    fn public_listing_hides_inactive_and_applies_filters() {
        let posts = sample();

        let all: Vec<i64> = public_posts(&posts, &PostFilter::default())
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(all, vec![5, 3, 2, 1]);

        let react_ui = PostFilter {
            category: Some("React".into()),
            tag: Some("ui".into()),
            ..PostFilter::default()
        };
        let ids: Vec<i64> = public_posts(&posts, &react_ui).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1]);

        let search = PostFilter {
            search: Some("TOKIO".into()),
            ..PostFilter::default()
        };
        assert_eq!(public_posts(&posts, &search)[0].id, 2);

        let march = PostFilter {
            year: Some(2024),
            month: Some(3),
            ..PostFilter::default()
        };
        assert_eq!(public_posts(&posts, &march).len(), 3);
    }
}
