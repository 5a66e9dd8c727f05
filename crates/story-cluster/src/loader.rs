//! Vector source loader.
//!
//! Pages through the eligible-items query and merges the pages into one
//! deterministic item list. Any page failure aborts the whole load.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use story_types::Item;

use crate::error::ClusterError;
use crate::source::{ItemSource, PageRequest};

/// Loads the eligible item set for a lookback window.
pub struct VectorLoader<'a> {
    source: &'a dyn ItemSource,
    page_size: usize,
}

impl<'a> VectorLoader<'a> {
    pub fn new(source: &'a dyn ItemSource, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    /// Fetch every eligible item created at or after `since`.
    ///
    /// Items are merged by id (a later page replaces an earlier copy) and
    /// returned sorted by `(created_at, id)`.
    #[instrument(skip(self))]
    pub async fn load(&self, since: DateTime<Utc>) -> Result<Vec<Item>, ClusterError> {
        let mut merged: HashMap<String, Item> = HashMap::new();
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .source
                .fetch_page(PageRequest {
                    since,
                    cursor: cursor.clone(),
                    limit: self.page_size,
                })
                .await?;
            pages += 1;

            debug!(page = pages, items = page.items.len(), "Fetched item page");

            for item in page.items {
                if item.is_eligible() {
                    merged.insert(item.id.clone(), item);
                }
            }

            match page.next_cursor {
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(ClusterError::Source(format!(
                            "Item source repeated cursor {}",
                            next
                        )));
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        let mut items: Vec<Item> = merged.into_values().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        info!(pages, items = items.len(), since = %since, "Loaded eligible items");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    use crate::source::ItemPage;

    fn item(id: &str, minutes: i64) -> Item {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Item::new(id, id, base + Duration::minutes(minutes), id)
            .with_normalized_text(id)
            .with_embedding(vec![1.0f32, 0.0])
    }

    /// Serves canned pages keyed by cursor.
    struct PagedSource {
        pages: HashMap<Option<String>, ItemPage>,
        requests: Mutex<Vec<PageRequest>>,
    }

    #[async_trait]
    impl ItemSource for PagedSource {
        async fn fetch_page(&self, request: PageRequest) -> Result<ItemPage, ClusterError> {
            self.requests.lock().unwrap().push(request.clone());
            self.pages
                .get(&request.cursor)
                .cloned()
                .ok_or_else(|| ClusterError::Source("boom".to_string()))
        }
    }

    fn page(items: Vec<Item>, next: Option<&str>) -> ItemPage {
        ItemPage {
            items,
            next_cursor: next.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_load_merges_pages_and_sorts() {
        let mut pages = HashMap::new();
        pages.insert(None, page(vec![item("c", 3), item("a", 1)], Some("p1")));
        pages.insert(
            Some("p1".to_string()),
            page(vec![item("b", 1), item("a", 1)], None),
        );
        let source = PagedSource {
            pages,
            requests: Mutex::new(Vec::new()),
        };

        let loader = VectorLoader::new(&source, 2);
        let items = loader.load(Utc::now()).await.unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.limit == 2));
    }

    #[tokio::test]
    async fn test_load_fails_on_page_error() {
        let mut pages = HashMap::new();
        pages.insert(None, page(vec![item("a", 1)], Some("missing")));
        let source = PagedSource {
            pages,
            requests: Mutex::new(Vec::new()),
        };

        let result = VectorLoader::new(&source, 10).load(Utc::now()).await;
        assert!(matches!(result, Err(ClusterError::Source(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_repeated_cursor() {
        let mut pages = HashMap::new();
        pages.insert(None, page(vec![item("a", 1)], Some("loop")));
        pages.insert(Some("loop".to_string()), page(vec![item("b", 2)], Some("loop")));
        let source = PagedSource {
            pages,
            requests: Mutex::new(Vec::new()),
        };

        let result = VectorLoader::new(&source, 10).load(Utc::now()).await;
        assert!(matches!(result, Err(ClusterError::Source(_))));
    }

    #[tokio::test]
    async fn test_load_drops_ineligible_items() {
        let mut reply = item("r", 1);
        reply.is_reply = true;
        let mut pages = HashMap::new();
        pages.insert(None, page(vec![item("a", 1), reply], None));
        let source = PagedSource {
            pages,
            requests: Mutex::new(Vec::new()),
        };

        let items = VectorLoader::new(&source, 10).load(Utc::now()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a");
    }
}
