/// Read-through caching for external catalog lookups.
///
/// Checks the cache first and returns the hit if present. On a miss the
/// block computes the value, which is stored with the given TTL on a
/// background task. A failed cache read is treated as a miss (and the
/// write is skipped, since Redis is likely down).
///
/// # Arguments
/// * `$cache`: a [`crate::db::redis::Cache`]
/// * `$key`: the [`crate::db::redis::CacheKey`] for this lookup
/// * `$ttl`: time-to-live for the cached value, in seconds
/// * `$block`: async block computing the value on a miss
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache.get(&$key).await {
            Ok(Some(cached)) => Ok(cached),
            Ok(None) => {
                let value = $block.await?;
                $cache.put_in_background(&$key, &value, $ttl);
                Ok(value)
            }
            Err(e) => {
                ::tracing::warn!(error = %e, "Cache read failed; treating as miss");
                $block.await
            }
        }
    }};
}
