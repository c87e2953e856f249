use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};

/// A single comment without its replies, as stored in the `comments` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub author: String,
    pub content: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub likes: i64,
}

/// Nested view of a comment, the shape used by the JSON file and the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub author: String,
    pub content: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.author.trim().is_empty() || self.content.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Author and content are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Unlike,
}

impl LikeAction {
    pub fn apply(self, likes: i64) -> i64 {
        match self {
            Self::Like => likes + 1,
            Self::Unlike => (likes - 1).max(0),
        }
    }
}

/// Comment tree of one post stored as an arena: a flat id → record map plus
/// an ordered child index. Replies are only materialized by [`to_nested`].
///
/// [`to_nested`]: CommentTree::to_nested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentTree {
    nodes: HashMap<i64, CommentRecord>,
    children: HashMap<i64, Vec<i64>>,
    roots: Vec<i64>,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from flat rows in two passes: index every row by id, then
    /// attach each row to its parent. Rows whose parent is missing (or that
    /// sit on a parent cycle) are promoted to top level.
    pub fn from_records(records: Vec<CommentRecord>) -> Self {
        let mut tree = Self::new();
        let mut order = Vec::with_capacity(records.len());

        for record in records {
            if tree.nodes.contains_key(&record.id) {
                tracing::warn!("Skipping duplicate comment id={}", record.id);
                continue;
            }
            order.push(record.id);
            tree.nodes.insert(record.id, record);
        }

        for id in &order {
            let parent = tree.nodes.get(id).and_then(|r| r.parent_id);
            match parent {
                Some(parent_id) if parent_id != *id && tree.nodes.contains_key(&parent_id) => {
                    tree.children.entry(parent_id).or_default().push(*id);
                }
                Some(parent_id) => {
                    tracing::warn!(
                        "Comment id={} references missing parent id={}, attaching at top level",
                        id,
                        parent_id
                    );
                    tree.promote_to_root(*id);
                }
                None => tree.roots.push(*id),
            }
        }

        let reachable: HashSet<i64> = tree.ids_preorder().into_iter().collect();
        for id in order {
            if !reachable.contains(&id) {
                tracing::warn!(
                    "Comment id={} is part of a parent cycle, attaching at top level",
                    id
                );
                tree.detach(id);
                tree.promote_to_root(id);
            }
        }

        tree
    }

    /// Builds a tree from the nested shape. Structure wins over the stored
    /// `parent_id` fields, which are rewritten to match the nesting.
    pub fn from_nested(comments: Vec<Comment>) -> Self {
        let mut tree = Self::new();
        let mut stack: Vec<(Option<i64>, Comment)> =
            comments.into_iter().rev().map(|c| (None, c)).collect();

        while let Some((parent_id, comment)) = stack.pop() {
            let Comment {
                id,
                post_id,
                author,
                content,
                date,
                likes,
                replies,
                ..
            } = comment;

            if tree.nodes.contains_key(&id) {
                tracing::warn!("Skipping duplicate comment id={} and its replies", id);
                continue;
            }

            tree.nodes.insert(
                id,
                CommentRecord {
                    id,
                    post_id,
                    parent_id,
                    author,
                    content,
                    date,
                    likes,
                },
            );
            match parent_id {
                Some(parent) => tree.children.entry(parent).or_default().push(id),
                None => tree.roots.push(id),
            }

            stack.extend(replies.into_iter().rev().map(|reply| (Some(id), reply)));
        }

        tree
    }

    pub fn to_nested(&self) -> Vec<Comment> {
        self.roots.iter().filter_map(|id| self.nest(*id)).collect()
    }

    fn nest(&self, id: i64) -> Option<Comment> {
        let record = self.nodes.get(&id)?;
        Some(Comment {
            id: record.id,
            post_id: record.post_id,
            parent_id: record.parent_id,
            author: record.author.clone(),
            content: record.content.clone(),
            date: record.date,
            likes: record.likes,
            replies: self
                .replies(id)
                .iter()
                .filter_map(|child| self.nest(*child))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&CommentRecord> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut CommentRecord> {
        self.nodes.get_mut(&id)
    }

    pub fn roots(&self) -> &[i64] {
        &self.roots
    }

    pub fn replies(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every id in pre-order: each comment is listed before its replies.
    pub fn ids_preorder(&self) -> Vec<i64> {
        let mut ids = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<i64> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            ids.push(id);
            stack.extend(self.replies(id).iter().rev().copied());
        }
        ids
    }

    /// Records in pre-order, so parents always precede their replies.
    pub fn records_preorder(&self) -> Vec<&CommentRecord> {
        self.ids_preorder()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .collect()
    }

    /// Returns `candidate`, bumped by one until it no longer collides with an
    /// id already present in this tree.
    pub fn next_comment_id(&self, candidate: i64) -> i64 {
        let mut id = candidate;
        while self.nodes.contains_key(&id) {
            id += 1;
        }
        id
    }

    pub fn insert(&mut self, record: CommentRecord) -> Result<(), DomainError> {
        if self.nodes.contains_key(&record.id) {
            return Err(DomainError::Conflict(format!(
                "Comment id {} already exists",
                record.id
            )));
        }

        match record.parent_id {
            Some(parent_id) => {
                if !self.nodes.contains_key(&parent_id) {
                    return Err(DomainError::ParentCommentNotFound);
                }
                self.children.entry(parent_id).or_default().push(record.id);
            }
            None => self.roots.push(record.id),
        }

        self.nodes.insert(record.id, record);
        Ok(())
    }

    /// Removes a comment and its whole subtree, returning the removed ids in
    /// pre-order (the requested id first).
    pub fn remove_subtree(&mut self, id: i64) -> Result<Vec<i64>, DomainError> {
        if !self.nodes.contains_key(&id) {
            return Err(DomainError::CommentNotFound);
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            removed.push(current);
            if let Some(kids) = self.children.get(&current) {
                stack.extend(kids.iter().rev().copied());
            }
        }

        self.detach(id);
        for removed_id in &removed {
            self.nodes.remove(removed_id);
            self.children.remove(removed_id);
        }

        Ok(removed)
    }

    fn detach(&mut self, id: i64) {
        match self.nodes.get(&id).and_then(|r| r.parent_id) {
            Some(parent_id) => {
                let now_empty = match self.children.get_mut(&parent_id) {
                    Some(kids) => {
                        kids.retain(|kid| *kid != id);
                        kids.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.children.remove(&parent_id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    fn promote_to_root(&mut self, id: i64) {
        if let Some(record) = self.nodes.get_mut(&id) {
            record.parent_id = None;
        }
        self.roots.push(id);
    }

    pub(crate) fn set_post_id(&mut self, post_id: i64) {
        for record in self.nodes.values_mut() {
            record.post_id = post_id;
        }
    }
}

impl Serialize for CommentTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_nested().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CommentTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let comments = Option::<Vec<Comment>>::deserialize(deserializer)?;
        Ok(Self::from_nested(comments.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, parent_id: Option<i64>) -> CommentRecord {
        CommentRecord {
            id,
            post_id: 1,
            parent_id,
            author: format!("author-{id}"),
            content: format!("comment {id}"),
            date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            likes: 0,
        }
    }

    fn sample_tree() -> CommentTree {
        // 1
        // ├── 2
        // │   └── 4
        // └── 3
        // 5
        CommentTree::from_records(vec![
            record(4, Some(2)),
            record(1, None),
            record(2, Some(1)),
            record(3, Some(1)),
            record(5, None),
        ])
    }

    #[test]
    fn two_pass_build_attaches_children_regardless_of_row_order() {
        let tree = sample_tree();

        assert_eq!(tree.len(), 5);
        assert_eq!(tree.roots(), &[1, 5]);
        assert_eq!(tree.replies(1), &[2, 3]);
        assert_eq!(tree.replies(2), &[4]);
        assert_eq!(tree.ids_preorder(), vec![1, 2, 4, 3, 5]);
    }

    #[test]
    fn orphans_and_cycles_are_promoted_to_top_level() {
        let tree = CommentTree::from_records(vec![
            record(1, None),
            record(2, Some(99)),
            record(3, Some(4)),
            record(4, Some(3)),
        ]);

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.get(2).unwrap().parent_id, None);
        assert_eq!(tree.ids_preorder().len(), 4);
    }

    #[test]
    fn nested_round_trip_keeps_structure() {
        let tree = sample_tree();
        let nested = tree.to_nested();

        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].replies.len(), 2);
        assert_eq!(nested[0].replies[0].replies[0].id, 4);
        assert_eq!(nested[0].replies[0].replies[0].parent_id, Some(2));

        assert_eq!(CommentTree::from_nested(nested), tree);
    }

    #[test]
    fn nesting_overrides_stale_parent_ids() {
        let mut child = CommentTree::from_records(vec![record(2, None)]).to_nested();
        let mut parent = CommentTree::from_records(vec![record(1, None)]).to_nested();
        parent[0].replies.append(&mut child);

        let tree = CommentTree::from_nested(parent);
        assert_eq!(tree.get(2).unwrap().parent_id, Some(1));
    }

    #[test]
    fn insert_reply_under_existing_comment() {
        let mut tree = sample_tree();
        tree.insert(record(10, Some(3))).unwrap();

        let nested = tree.to_nested();
        let comment_three = &nested[0].replies[1];
        assert_eq!(comment_three.id, 3);
        assert_eq!(comment_three.replies.len(), 1);
        assert_eq!(comment_three.replies[0].id, 10);
        assert_eq!(comment_three.replies[0].parent_id, Some(3));
    }

    #[test]
    fn insert_rejects_missing_parent_and_duplicate_id() {
        let mut tree = sample_tree();

        assert!(matches!(
            tree.insert(record(11, Some(42))),
            Err(DomainError::ParentCommentNotFound)
        ));
        assert!(matches!(
            tree.insert(record(3, None)),
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn remove_subtree_cascades_to_every_descendant() {
        let mut tree = sample_tree();

        let removed = tree.remove_subtree(1).unwrap();

        assert_eq!(removed, vec![1, 2, 4, 3]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.roots(), &[5]);
        for id in removed {
            assert!(!tree.contains(id));
            assert!(tree.replies(id).is_empty());
        }
    }

    #[test]
    fn remove_leaf_cleans_parent_index() {
        let mut tree = sample_tree();
        tree.remove_subtree(4).unwrap();

        assert!(tree.replies(2).is_empty());
        assert_eq!(
            tree,
            CommentTree::from_records(vec![
                record(1, None),
                record(2, Some(1)),
                record(3, Some(1)),
                record(5, None),
            ])
        );
        assert!(matches!(
            tree.remove_subtree(4),
            Err(DomainError::CommentNotFound)
        ));
    }

    #[test]
    fn next_comment_id_skips_taken_ids() {
        let tree = CommentTree::from_records(vec![
            record(1_000, None),
            record(1_001, Some(1_000)),
            record(1_003, None),
        ]);

        assert_eq!(tree.next_comment_id(1_000), 1_002);
        assert_eq!(tree.next_comment_id(1_003), 1_004);
        assert_eq!(tree.next_comment_id(500), 500);
    }

    #[test]
    fn two_ids_in_the_same_millisecond_never_collide() {
        let mut tree = CommentTree::new();
        let now = 1_700_000_000_000;

        let first = tree.next_comment_id(now);
        tree.insert(record(first, None)).unwrap();
        let second = tree.next_comment_id(now);
        tree.insert(record(second, Some(first))).unwrap();

        assert_ne!(first, second);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn like_action_never_goes_negative() {
        assert_eq!(LikeAction::Like.apply(0), 1);
        assert_eq!(LikeAction::Unlike.apply(1), 0);
        assert_eq!(LikeAction::Unlike.apply(0), 0);
    }

    #[test]
    fn new_comment_requires_author_and_content() {
        let missing = NewComment {
            author: "  ".into(),
            content: "hi".into(),
            parent_id: None,
        };
        assert!(matches!(
            missing.validate(),
            Err(DomainError::ValidationError(_))
        ));

        let ok = NewComment {
            author: "Ann".into(),
            content: "hi".into(),
            parent_id: Some(3),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn serializes_as_nested_array() {
        let tree = sample_tree();
        let json = serde_json::to_value(&tree).unwrap();

        assert!(json.is_array());
        assert_eq!(json[0]["replies"][0]["replies"][0]["parentId"], 2);
        assert!(json[1].get("parentId").is_none());

        let back: CommentTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }
}
