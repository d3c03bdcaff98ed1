pub mod events;
pub mod postgres;
pub mod redis;

pub use events::{EventStore, PgEventStore};
pub use redis::{create_redis_client, Cache, CacheKey};
