pub mod comment;
pub mod error;
pub mod post;
pub mod slug;

pub use comment::{Comment, CommentRecord, CommentTree, LikeAction, NewComment};
pub use error::DomainError;
pub use post::{CreatePostRequest, Post, PostPatch, UpdatePostRequest};
pub use slug::derive_slug;
