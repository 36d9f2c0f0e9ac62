use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::ports::route_cache::{CacheResult, CacheSnapshot, RouteCache};

/// Route cache stored as a single JSON document on disk.
///
/// Writes go to a uniquely named temp file in the target directory that is
/// then renamed over the cache file, so readers never see a partial write.
/// A file that cannot be parsed, or whose version or freshness marker does
/// not match, is reported as a miss.
#[derive(Debug, Clone)]
pub struct FileRouteCache {
    path: PathBuf,
}

impl FileRouteCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "routes.cache".to_string());
        let temp_name = format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple());
        match self.path.parent() {
            Some(dir) => dir.join(temp_name),
            None => PathBuf::from(temp_name),
        }
    }
}

#[async_trait]
impl RouteCache for FileRouteCache {
    async fn load(&self, freshness: &str) -> CacheResult<Option<CacheSnapshot>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!("Cannot read route cache {}: {}", self.path.display(), e);
                return Ok(None);
            }
        };

        let snapshot: CacheSnapshot = match serde_json::from_slice(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Ignoring corrupt route cache {}: {}", self.path.display(), e);
                return Ok(None);
            }
        };

        if !snapshot.is_current(freshness) {
            tracing::warn!(
                version = snapshot.version,
                "Ignoring stale route cache {}",
                self.path.display()
            );
            return Ok(None);
        }

        Ok(Some(snapshot))
    }

    async fn store(&self, snapshot: CacheSnapshot) -> CacheResult<()> {
        let data = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let temp = self.temp_path();
        if let Err(e) = fs::write(&temp, &data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        tracing::debug!(
            routes = snapshot.routes.len(),
            "Route cache written to {}",
            self.path.display()
        );
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{
        core::{collection::RouteCollection, handler::HandlerDescriptor, route::Route},
        ports::route_cache::SNAPSHOT_VERSION,
    };

    fn snapshot(freshness: &str) -> CacheSnapshot {
        let mut routes = RouteCollection::new();
        routes
            .add(
                Route::get("/posts/{id}", HandlerDescriptor::named("PostController", "show"))
                    .unwrap()
                    .with_name("posts.show"),
            )
            .unwrap();
        CacheSnapshot::capture(&routes, freshness).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() -> eyre::Result<()> {
        let dir = tempdir()?;
        let cache = FileRouteCache::new(dir.path().join("nested/routes.json"));

        assert!(cache.load("f1").await?.is_none());
        cache.store(snapshot("f1")).await?;

        let loaded = cache.load("f1").await?.expect("cache hit");
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.routes[0].name.as_deref(), Some("posts.show"));

        // Only the cache file is left behind.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested"))?.collect();
        assert_eq!(entries.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_freshness_is_miss() -> eyre::Result<()> {
        let dir = tempdir()?;
        let cache = FileRouteCache::new(dir.path().join("routes.json"));
        cache.store(snapshot("old")).await?;
        assert!(cache.load("new").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_is_miss() -> eyre::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("routes.json");
        std::fs::write(&path, b"{ not json")?;
        let cache = FileRouteCache::new(&path);
        assert!(cache.load("any").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_version_is_miss() -> eyre::Result<()> {
        let dir = tempdir()?;
        let cache = FileRouteCache::new(dir.path().join("routes.json"));
        let mut old = snapshot("f1");
        old.version = SNAPSHOT_VERSION + 1;
        cache.store(old).await?;
        assert!(cache.load("f1").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_clear() -> eyre::Result<()> {
        let dir = tempdir()?;
        let cache = FileRouteCache::new(dir.path().join("routes.json"));
        cache.clear().await?;
        cache.store(snapshot("f1")).await?;
        cache.clear().await?;
        assert!(!cache.path().exists());
        Ok(())
    }
}
