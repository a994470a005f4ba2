// Cache module.
// Two TTL tiers: raw upstream responses keyed by URL and built views keyed by path.

pub mod connection;
pub mod paths;
pub mod response;
pub mod store;
pub mod view;

pub use connection::{Backend, Connection, ConnectionOptions};
pub use response::{CachedResponse, RESPONSE_TTL, ResponseCache};
pub use store::{CacheEntry, FileStore, MemoryStore, Store};
pub use view::{VIEW_TTL, ViewBuilder, ViewCache, ViewStatus};
