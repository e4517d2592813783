//! Sequential batch ingestion over every known school.

use std::time::Duration;

use time::Date;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::errors::PersistenceError;
use crate::meals::repo_types::MealSlot;
use crate::meals::services::{IngestRequest, IngestionCoordinator, Outcome};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub date: Date,
    pub slot: MealSlot,
    pub force_refresh: bool,
    /// Fixed gap between upstream calls.
    pub pause: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub fetched: usize,
    pub cached: usize,
    pub no_data: usize,
    pub degraded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.fetched + self.cached + self.no_data + self.degraded + self.failed
    }
}

/// Walks the school roster one school at a time.
///
/// `shutdown` flipping to `true` stops the loop between schools; a school
/// already in flight always finishes its write first.
#[instrument(skip(coordinator, shutdown), fields(date = %opts.date, slot = %opts.slot))]
pub async fn run_batch(
    coordinator: &IngestionCoordinator,
    opts: &BatchOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<BatchSummary, PersistenceError> {
    let schools = coordinator.store().list_schools().await?;
    let mut summary = BatchSummary {
        total: schools.len(),
        ..Default::default()
    };
    info!(schools = schools.len(), "batch started");

    for (i, school) in schools.iter().enumerate() {
        if *shutdown.borrow() {
            summary.cancelled = true;
            break;
        }

        let req = IngestRequest {
            school_code: school.school_code.clone(),
            office_code: school.office_code.clone(),
            date: opts.date,
            slot: opts.slot,
            force_refresh: opts.force_refresh,
        };

        let called_upstream = match coordinator.run(&req).await {
            Ok(done) => {
                match done.outcome {
                    Outcome::Fetched => summary.fetched += 1,
                    Outcome::Cached => summary.cached += 1,
                    Outcome::NoData => summary.no_data += 1,
                    Outcome::Degraded => {
                        warn!(school_code = %school.school_code, "feed unavailable; kept cached or sentinel row");
                        summary.degraded += 1;
                    }
                }
                done.outcome != Outcome::Cached
            }
            Err(e) => {
                error!(error = %e, school_code = %school.school_code, "school ingestion failed");
                summary.failed += 1;
                true
            }
        };

        let last = i + 1 == schools.len();
        if called_upstream && !last && pause_or_cancel(opts.pause, &mut shutdown).await {
            summary.cancelled = true;
            break;
        }
    }

    info!(
        total = summary.total,
        processed = summary.processed(),
        fetched = summary.fetched,
        cached = summary.cached,
        no_data = summary.no_data,
        degraded = summary.degraded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "batch finished"
    );
    Ok(summary)
}

/// Sleeps for `pause`; returns `true` if shutdown was requested meanwhile.
async fn pause_or_cancel(pause: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = sleep(pause) => false,
        _ = cancelled(shutdown) => true,
    }
}

async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    // a dropped sender means nobody can cancel any more
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use time::macros::date;

    use super::*;
    use crate::config::IngestConfig;
    use crate::meals::repo::memory::MemoryMealStore;
    use crate::meals::repo_types::School;
    use crate::meals::services::tests::{lunch_row, Script, ScriptedFeed};

    fn roster(n: usize) -> Vec<School> {
        (0..n)
            .map(|i| School {
                school_code: format!("70100{i:02}"),
                office_code: "B10".into(),
            })
            .collect()
    }

    fn opts(pause: Duration) -> BatchOptions {
        BatchOptions {
            date: date!(2024 - 03 - 15),
            slot: MealSlot::Lunch,
            force_refresh: false,
            pause,
        }
    }

    fn coordinator(feed: Arc<ScriptedFeed>, store: Arc<MemoryMealStore>) -> IngestionCoordinator {
        IngestionCoordinator::new(feed, store, IngestConfig::default())
    }

    #[tokio::test]
    async fn one_failing_school_does_not_abort_the_run() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            Script::Rows(vec![lunch_row("쌀밥")]),
            Script::Fail,
            Script::Rows(vec![]),
        ]));
        let store = Arc::new(MemoryMealStore::with_schools(roster(3)));
        let c = coordinator(feed.clone(), store.clone());
        let (_tx, rx) = watch::channel(false);

        let summary = run_batch(&c, &opts(Duration::from_millis(1)), rx).await.unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                total: 3,
                fetched: 1,
                cached: 0,
                no_data: 1,
                degraded: 1,
                failed: 0,
                cancelled: false,
            }
        );
        assert_eq!(store.row_count(), 3);
        assert_eq!(feed.calls(), 3);
    }

    #[tokio::test]
    async fn second_run_is_served_from_store() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            Script::Rows(vec![lunch_row("쌀밥")]),
            Script::Rows(vec![lunch_row("잡곡밥")]),
        ]));
        let store = Arc::new(MemoryMealStore::with_schools(roster(2)));
        let c = coordinator(feed.clone(), store.clone());
        let (_tx, rx) = watch::channel(false);

        run_batch(&c, &opts(Duration::from_millis(1)), rx.clone()).await.unwrap();
        let again = run_batch(&c, &opts(Duration::from_millis(1)), rx).await.unwrap();

        assert_eq!(again.cached, 2);
        assert_eq!(feed.calls(), 2);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_processes_nothing() {
        let feed = Arc::new(ScriptedFeed::new(vec![]));
        let store = Arc::new(MemoryMealStore::with_schools(roster(2)));
        let c = coordinator(feed.clone(), store);
        let (_tx, rx) = watch::channel(true);

        let summary = run_batch(&c, &opts(Duration::from_millis(1)), rx).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.processed(), 0);
        assert_eq!(feed.calls(), 0);
    }

    #[tokio::test]
    async fn cancel_during_pause_stops_after_current_school() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            Script::Rows(vec![lunch_row("쌀밥")]),
            Script::Rows(vec![lunch_row("쌀밥")]),
        ]));
        let store = Arc::new(MemoryMealStore::with_schools(roster(2)));
        let c = coordinator(feed.clone(), store.clone());
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let started = Instant::now();
        let summary = run_batch(&c, &opts(Duration::from_secs(60)), rx).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.fetched, 1);
        assert_eq!(store.row_count(), 1);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn roster_failure_is_fatal() {
        let store = Arc::new(MemoryMealStore::with_schools(roster(1)));
        store.break_store();
        let c = coordinator(Arc::new(ScriptedFeed::new(vec![])), store);
        let (_tx, rx) = watch::channel(false);

        assert!(run_batch(&c, &opts(Duration::from_millis(1)), rx).await.is_err());
    }
}
