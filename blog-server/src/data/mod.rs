pub mod cache;
pub mod file_store;
#[cfg(test)]
pub mod memory_store;
pub mod post_repository;
pub mod primary_store;

pub use cache::PostCache;
pub use file_store::JsonFileStore;
pub use post_repository::{PostStore, PostgresPostStore};
pub use primary_store::{PrimaryStore, StoreWrite};
