//! Smoke test driving a batch through the facade re-exports only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use steadfast::{
    BatchConfig, BatchOutcome, BatchRunner, BatchWork, CancellationGuard, ErrorClass,
    GuardSettings, HttpFailure, ItemContext, ItemOutcome, JsonRecordStore, ProcessTerminator,
    Regime, RetryError, ServiceClassifier, SteadfastConfig, SteadfastResult, Throttler,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Statement {
    problem: u32,
    text: String,
}

struct ScrapeWork {
    throttle: Throttler,
    store: JsonRecordStore,
}

#[async_trait]
impl BatchWork for ScrapeWork {
    type Item = u32;
    type Output = Statement;

    fn describe(&self, item: &u32) -> String {
        format!("problem-{}", item)
    }

    async fn execute(
        &self,
        item: &u32,
        ctx: &ItemContext,
    ) -> Result<ItemOutcome<Statement>, RetryError> {
        let problem = *item;
        if problem == 0 {
            return Ok(ItemOutcome::Skipped("no such problem".to_string()));
        }
        let statement = ctx
            .executor(&self.throttle, 3)
            .run(
                || async move {
                    if problem == 3 {
                        Err(HttpFailure::status(404, "not found"))
                    } else {
                        Ok(Statement {
                            problem,
                            text: format!("Statement for {}", problem),
                        })
                    }
                },
                ServiceClassifier::Scraper.classifier(),
            )
            .await?;
        Ok(ItemOutcome::Completed(statement))
    }

    async fn save(&self, item: &u32, output: Statement) -> SteadfastResult<u64> {
        self.store.save(&self.describe(item), &output).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_scrape_batch_through_facade() {
    let dir = TempDir::new().unwrap();
    let mut config = SteadfastConfig::defaults().unwrap();
    // No politeness delay in tests
    if let Some(scrape) = config.batch.get_mut("scrape") {
        scrape.random_delay_ms = None;
    }

    let throttle = Throttler::new("scraper", config.throttle("scraper").unwrap()).unwrap();
    let work = Arc::new(ScrapeWork {
        throttle,
        store: JsonRecordStore::new(dir.path()).unwrap(),
    });
    let guard = CancellationGuard::detached(
        GuardSettings::default(),
        Arc::new(ProcessTerminator),
    );

    let report = BatchRunner::new(BatchConfig::for_regime(Regime::BulkScrape, &config))
        .unwrap()
        .with_guard(guard.clone())
        .run(vec![0, 1, 2, 3, 4], work.clone())
        .await;

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(*report.summary.skipped(), 1);
    assert_eq!(*report.summary.succeeded(), 3);
    assert_eq!(*report.summary.errored(), 1);

    let saved: Statement = work.store.load("problem-2").await.unwrap();
    assert_eq!(saved.text, "Statement for 2");
    assert!(!work.store.exists("problem-3").await);

    // Nothing pending, so this returns normally
    guard.honor_pending();
    assert!(matches!(
        ServiceClassifier::Scraper.classify(&HttpFailure::status(404, "not found")),
        ErrorClass::NonRetriable(_)
    ));
}
