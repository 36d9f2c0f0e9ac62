//! Process-local route cache backend.
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;

use crate::ports::route_cache::{CacheResult, CacheSnapshot, RouteCache};

/// Keeps the last stored snapshot in memory. Useful for tests and for hosts
/// that rebuild the router several times per process (hot reload).
#[derive(Default)]
pub struct MemoryRouteCache {
    slot: ArcSwapOption<CacheSnapshot>,
}

impl MemoryRouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load().is_none()
    }
}

#[async_trait]
impl RouteCache for MemoryRouteCache {
    async fn load(&self, freshness: &str) -> CacheResult<Option<CacheSnapshot>> {
        let Some(snapshot) = self.slot.load_full() else {
            return Ok(None);
        };
        if !snapshot.is_current(freshness) {
            tracing::warn!(version = snapshot.version, "Ignoring stale in-memory route snapshot");
            return Ok(None);
        }
        Ok(Some(CacheSnapshot::clone(&snapshot)))
    }

    async fn store(&self, snapshot: CacheSnapshot) -> CacheResult<()> {
        self.slot.store(Some(Arc::new(snapshot)));
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.slot.store(None);
        Ok(())
    }
}
