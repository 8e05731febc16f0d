//! Candidate-window selection for one period.
//!
//! A single query against a sparse, cloud-prone archive may under-return, so
//! the selector re-issues the identical query a fixed number of times and
//! merges the batches, de-duplicating by scene id. The repeat count is a
//! configured constant, not adaptive to yield; coming away with few scenes
//! (or none) is not an error.

use std::collections::BTreeSet;
use std::time::Duration;

use log::{debug, warn};

use crate::source::{Scene, SceneQuery, SceneSource};

#[derive(Debug, Clone)]
pub struct WindowSelector {
    /// Number of identical queries issued per period.
    pub attempts: u32,
    /// Pause between consecutive queries.
    pub backoff: Duration,
}

impl WindowSelector {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Issue the query `attempts` times and merge the results. A failed
    /// individual attempt is logged and skipped; the merged collection is
    /// returned regardless of yield.
    pub fn collect(&self, source: &dyn SceneSource, query: &SceneQuery) -> Vec<Scene> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut scenes = Vec::new();

        for attempt in 0..self.attempts {
            if attempt > 0 && !self.backoff.is_zero() {
                std::thread::sleep(self.backoff);
            }
            match source.query(query) {
                Ok(batch) => {
                    for scene in batch {
                        if seen.insert(scene.id.clone()) {
                            scenes.push(scene);
                        }
                    }
                }
                Err(e) => warn!(
                    "scene query attempt {}/{} failed for tile {}: {}",
                    attempt + 1,
                    self.attempts,
                    query.tile,
                    e
                ),
            }
        }

        debug!(
            "window {}..{} tile {}: {} scene(s) after {} attempt(s)",
            query.range.start,
            query.range.end,
            query.tile,
            scenes.len(),
            self.attempts
        );
        scenes
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use super::*;
    use crate::calendar::DateRange;
    use crate::error::{Error, Result};
    use crate::raster::Raster;
    use crate::source::Scene;
    use crate::tile::TileId;

    struct CountingSource {
        calls: AtomicUsize,
        batch: Vec<Scene>,
        fail_first: bool,
    }

    impl SceneSource for CountingSource {
        fn query(&self, _query: &SceneQuery) -> Result<Vec<Scene>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(Error::Query("transient".into()));
            }
            Ok(self.batch.clone())
        }
    }

    fn scene(id: &str) -> Scene {
        let mut channels = BTreeMap::new();
        channels.insert(
            crate::bands::Band::Red,
            Raster::new(2, 2, 0.0, 60.0, 0.0, 60.0, 0.1),
        );
        Scene {
            id: id.to_string(),
            tile: TileId::new(220, 76),
            date: NaiveDate::from_ymd_opt(2015, 1, 10).unwrap(),
            cloud_cover: 10.0,
            channels,
            qa_cloud: vec![false; 4],
        }
    }

    fn query() -> SceneQuery {
        SceneQuery {
            tile: TileId::new(220, 76),
            range: DateRange {
                start: NaiveDate::from_ymd_opt(2014, 12, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2015, 1, 31).unwrap(),
            },
            max_cloud_cover: 90.0,
        }
    }

    #[test]
    fn issues_exactly_the_configured_number_of_queries() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            batch: vec![scene("a"), scene("b")],
            fail_first: false,
        };
        let merged = WindowSelector::new(2).collect(&source, &query());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        // Identical batches merge without duplicates.
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn failed_attempt_is_skipped_not_fatal() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            batch: vec![scene("a")],
            fail_first: true,
        };
        let merged = WindowSelector::new(3).collect(&source, &query());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn empty_yield_is_not_an_error() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            batch: vec![],
            fail_first: false,
        };
        let merged = WindowSelector::new(2).collect(&source, &query());
        assert!(merged.is_empty());
    }
}
