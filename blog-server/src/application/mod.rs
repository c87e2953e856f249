pub mod auth_service;
pub mod blog_service;
pub mod catalog;
pub mod comment_service;
pub mod stores;
pub mod sync_service;

pub use auth_service::AuthService;
pub use blog_service::BlogService;
pub use catalog::PostFilter;
pub use comment_service::CommentService;
pub use stores::{PersistReport, Persisted, Stores};
pub use sync_service::{InitializeReport, LoadSource, SyncReport, SyncService};
