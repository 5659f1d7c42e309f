//! Lazy, single-flight loading of the engine library.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::AnimationEngine;
use crate::error::EngineError;

/// Loads the engine library at most once at a time.
///
/// Concurrent callers await the same pending load instead of fetching the
/// library again. A failed load leaves the loader empty so a later call can
/// retry.
pub struct LibraryLoader {
    engine: Arc<dyn AnimationEngine>,
    loaded: OnceCell<()>,
}

impl LibraryLoader {
    pub fn new(engine: Arc<dyn AnimationEngine>) -> Self {
        Self {
            engine,
            loaded: OnceCell::new(),
        }
    }

    /// Ensures the library is available.
    pub async fn ensure(&self) -> Result<(), EngineError> {
        self.loaded
            .get_or_try_init(|| async {
                log::info!("LibraryLoader: loading animation library");
                let result = self.engine.load_library().await;
                match &result {
                    Ok(()) => log::info!("LibraryLoader: animation library ready"),
                    Err(e) => log::error!("LibraryLoader: load failed: {}", e),
                }
                result
            })
            .await
            .map(|_| ())
    }

    /// Returns `true` once a load has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// The engine behind this loader.
    pub fn engine(&self) -> &Arc<dyn AnimationEngine> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::memory::InMemoryEngine;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_fetch() {
        let engine = InMemoryEngine::new().with_library_delay(Duration::from_millis(300));
        let loader = LibraryLoader::new(Arc::new(engine.clone()));

        let (a, b) = tokio::join!(loader.ensure(), loader.ensure());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(engine.library_loads(), 1);

        loader.ensure().await.unwrap();
        assert_eq!(engine.library_loads(), 1);
        assert!(loader.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_is_retried() {
        let engine = InMemoryEngine::new().with_library_failures(1);
        let loader = LibraryLoader::new(Arc::new(engine.clone()));

        assert!(loader.ensure().await.is_err());
        assert!(!loader.is_loaded());
        assert!(loader.ensure().await.is_ok());
        assert_eq!(engine.library_loads(), 2);
    }
}
