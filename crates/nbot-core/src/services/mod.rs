//! Shared collaborators injected into controllers through the container.

pub mod cache;
pub mod locale;
pub mod persistence;

pub use cache::{Cache, CacheConfig, MemoryCache};
pub use locale::LocaleStore;
pub use persistence::{PersistenceClient, QueryLogPolicy};
