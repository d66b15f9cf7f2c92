use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use moka::future::Cache;
use tracing::debug;
use yatube_shared::{Page, Post};

const MAX_CACHED_PAGES: u64 = 1_000;

/// Home-feed pages keyed by resolved page number.
///
/// Entries live for the configured TTL. Writes that go through the app call
/// [`clear`](Self::clear); rows changed behind the app's back stay visible
/// until their page expires or is invalidated.
///
/// Fills are tagged with the [`generation`](Self::generation) read before the
/// page was built, so a page read before a concurrent `clear` is not kept.
#[derive(Clone)]
pub struct IndexCache {
    pages: Option<Cache<i64, Arc<Page<Post>>>>,
    generation: Arc<AtomicU64>,
}

impl IndexCache {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        let pages = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHED_PAGES)
                .time_to_live(ttl)
                .build()
        });
        Self {
            pages,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn get(&self, page: i64) -> Option<Arc<Page<Post>>> {
        let cached = self.pages.as_ref()?.get(&page).await;
        if cached.is_some() {
            debug!(page, "Index page served from cache");
        }
        cached
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Stores a page built from data read after `generation` was taken.
    /// The entry is dropped again if the cache was cleared meanwhile.
    pub async fn insert(&self, page: i64, value: Arc<Page<Post>>, generation: u64) {
        let Some(pages) = &self.pages else {
            return;
        };
        pages.insert(page, value).await;
        if self.generation() != generation {
            debug!(page, "Index page went stale while it was built");
            pages.invalidate(&page).await;
        }
    }

    pub async fn invalidate(&self, page: i64) {
        if let Some(pages) = &self.pages {
            pages.invalidate(&page).await;
        }
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(pages) = &self.pages {
            pages.invalidate_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> Arc<Page<Post>> {
        Arc::new(Page {
            items: vec![Post {
                id: 1,
                text: text.to_string(),
                pub_date: String::new(),
                author: yatube_shared::User {
                    id: 1,
                    username: "someone".to_string(),
                },
                group: None,
                image: None,
            }],
            count: 1,
            number: 1,
            num_pages: 1,
            has_next: false,
            has_previous: false,
        })
    }

    #[tokio::test]
    async fn invalidate_drops_one_page() {
        let cache = IndexCache::new(Duration::from_secs(60));
        let generation = cache.generation();
        cache.insert(1, page("one"), generation).await;
        cache.insert(2, page("two"), generation).await;

        cache.invalidate(1).await;

        assert!(cache.get(1).await.is_none());
        assert_eq!(cache.get(2).await.unwrap().items[0].text, "two");
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = IndexCache::new(Duration::ZERO);
        cache.insert(1, page("one"), cache.generation()).await;
        assert!(cache.get(1).await.is_none());
    }

    #[tokio::test]
    async fn page_built_before_a_clear_is_not_kept() {
        let cache = IndexCache::new(Duration::from_secs(60));
        let generation = cache.generation();

        cache.clear();
        cache.insert(1, page("stale"), generation).await;
        assert!(cache.get(1).await.is_none());

        cache.insert(1, page("fresh"), cache.generation()).await;
        assert_eq!(cache.get(1).await.unwrap().items[0].text, "fresh");
    }
}
