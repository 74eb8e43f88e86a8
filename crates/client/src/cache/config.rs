//! Configuration for the TTL cache.

use crate::error::ApiError;

/// Configuration for [`TtlCache`](super::TtlCache)
///
/// TTLs are supplied per entry at insert time; the config only bounds how
/// many entries the cache may hold.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Maximum number of entries, or `None` for unbounded.
    ///
    /// When full, the least-recently-inserted entry is evicted
    /// deterministically to make room.
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    /// Unbounded cache (the base design).
    pub fn unbounded() -> Self {
        Self { max_entries: None }
    }

    /// Cache bounded to `max_entries` entries.
    pub fn bounded(max_entries: usize) -> Self {
        Self { max_entries: Some(max_entries) }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.max_entries == Some(0) {
            return Err(ApiError::InvalidConfiguration(
                "max_entries must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::config.
    use super::*;

    #[test]
    fn test_validation() {
        assert!(CacheConfig::unbounded().validate().is_ok());
        assert!(CacheConfig::bounded(50).validate().is_ok());
        assert!(CacheConfig::bounded(0).validate().is_err());
    }
}
