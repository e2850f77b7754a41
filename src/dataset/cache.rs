use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::{Dataset, DatasetSource};

/// Process-wide default dataset, loaded at most once.
///
/// Concurrent first callers share a single load. A failed load is not
/// cached: the caller gets an empty dataset and the next call tries again.
#[derive(Clone)]
pub struct DefaultDataset {
    source: Arc<dyn DatasetSource>,
    cell: Arc<OnceCell<Arc<Dataset>>>,
}

impl DefaultDataset {
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self {
            source,
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub async fn get(&self) -> Arc<Dataset> {
        let loaded = self
            .cell
            .get_or_try_init(|| async {
                let text = self.source.load().await?;
                let dataset = Dataset::from_csv(&text);
                info!(
                    source = %self.source.describe(),
                    rows = dataset.len(),
                    columns = dataset.columns().len(),
                    "Default dataset loaded"
                );
                Ok::<_, anyhow::Error>(Arc::new(dataset))
            })
            .await;

        match loaded {
            Ok(dataset) => dataset.clone(),
            Err(e) => {
                warn!(source = %self.source.describe(), error = %e, "Default dataset unavailable, using empty dataset");
                Arc::new(Dataset::empty())
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        loads: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl DatasetSource for CountingSource {
        async fn load(&self) -> anyhow::Result<String> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_first && n == 0 {
                anyhow::bail!("not yet");
            }
            Ok("name,score\na,1\nb,2\n".to_string())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test]
    async fn test_loaded_once_and_shared() {
        let source = Arc::new(CountingSource { loads: AtomicUsize::new(0), fail_first: false });
        let cache = DefaultDataset::new(source.clone());

        let (a, b) = tokio::join!(cache.get(), cache.get());
        let c = cache.get().await;

        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(a.len(), 2);
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let source = Arc::new(CountingSource { loads: AtomicUsize::new(0), fail_first: true });
        let cache = DefaultDataset::new(source.clone());

        let first = cache.get().await;
        assert!(first.is_empty());
        assert!(!cache.is_loaded());

        let second = cache.get().await;
        assert_eq!(second.len(), 2);
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }
}
