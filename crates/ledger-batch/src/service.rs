//! Recognition service: batch entry points and the single-image path.

use std::sync::Arc;

use ledger_core::{
    BatchResult, BatchSaveItem, BatchSaveResult, BillId, OutcomeStatus, RecognitionOutcome,
    RecognitionResult, UserId,
};
use ledger_vision::{build_prompt, default_prompt, Recognizer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::CategoryCache;
use crate::config::{Config, ConfigError};
use crate::context::Deadline;
use crate::error::ServiceError;
use crate::limiter::RateLimiter;
use crate::pool::WorkerPool;
use crate::store::LedgerStore;
use crate::task::{is_supported_content_type, ImageSource, RecognitionTask};

/// Reason recorded when a recognized image could not be persisted.
pub const REASON_SAVE_FAILED: &str = "failed to save bill";

/// Turns payment screenshots into recognition results and bills.
pub struct RecognitionService {
    config: Config,
    limiter: Arc<RateLimiter>,
    pool: WorkerPool,
    recognizer: Arc<dyn Recognizer>,
    categories: Arc<CategoryCache>,
    ledger: Arc<dyn LedgerStore>,
}

impl RecognitionService {
    /// Create the service. The rate limiter lives as long as the service.
    pub fn new(
        config: Config,
        recognizer: Arc<dyn Recognizer>,
        categories: Arc<CategoryCache>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(config.rpm));
        let pool = WorkerPool::new(
            config.worker_count,
            limiter.clone(),
            config.task_timeout(),
            recognizer.clone(),
            config.max_image_bytes,
        );

        info!(
            worker_count = config.worker_count,
            rpm = config.rpm,
            burst = limiter.burst(),
            task_timeout_secs = config.task_timeout_secs,
            max_images = config.max_images,
            "Recognition service ready"
        );

        Ok(Self {
            config,
            limiter,
            pool,
            recognizer,
            categories,
            ledger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Recognize a batch of images.
    ///
    /// `results[i]` of the returned batch answers `images[i]`. Per-image
    /// failures are reported in the result; only an empty or oversized batch
    /// is an error.
    pub async fn batch_recognize(
        &self,
        ctx: &CancellationToken,
        user_id: UserId,
        images: Vec<ImageSource>,
    ) -> Result<BatchResult, ServiceError> {
        let outcomes = self.run_batch(ctx, user_id, images).await?;
        let result = BatchResult::from_outcomes(outcomes);

        info!(
            user_id = %user_id,
            total = result.total,
            success_count = result.success_count,
            fail_count = result.fail_count,
            "Batch recognition finished"
        );
        Ok(result)
    }

    /// Recognize a batch and save a bill for every recognized image.
    ///
    /// Each save stands alone: a failed save marks only its own item.
    pub async fn batch_recognize_and_save(
        &self,
        ctx: &CancellationToken,
        user_id: UserId,
        images: Vec<ImageSource>,
    ) -> Result<BatchSaveResult, ServiceError> {
        let image_paths: Vec<String> = images.iter().map(ImageSource::image_path).collect();
        let outcomes = self.run_batch(ctx, user_id, images).await?;

        let mut items = Vec::with_capacity(outcomes.len());
        for (outcome, image_path) in outcomes.into_iter().zip(image_paths) {
            items.push(self.save_outcome(user_id, outcome, &image_path).await);
        }
        let result = BatchSaveResult::from_items(items);

        info!(
            user_id = %user_id,
            total = result.total,
            success_count = result.success_count,
            fail_count = result.fail_count,
            "Batch recognition and save finished"
        );
        Ok(result)
    }

    /// Recognize one image right away.
    ///
    /// Unlike a batch, this never waits for the rate limiter: with no token
    /// available it fails with [`ServiceError::TooManyRequests`].
    pub async fn recognize_image(
        &self,
        ctx: &CancellationToken,
        user_id: UserId,
        image: &ImageSource,
    ) -> Result<RecognitionResult, ServiceError> {
        if image.size > self.config.max_image_bytes {
            return Err(ServiceError::ImageTooLarge);
        }
        if !is_supported_content_type(&image.content_type) {
            return Err(ServiceError::UnsupportedFormat);
        }
        if !self.limiter.try_acquire() {
            return Err(ServiceError::TooManyRequests);
        }

        let prompt = self.prompt_for(user_id).await;
        let deadline = Deadline::new(ctx, self.config.task_timeout());
        let bytes = deadline
            .run(image.read())
            .await?
            .map_err(ServiceError::ReadImage)?;

        let result = deadline
            .run(self.recognizer.recognize(&bytes, &image.content_type, &prompt))
            .await??;
        Ok(result)
    }

    /// Recognize one image and save it as a bill.
    pub async fn recognize_and_save(
        &self,
        ctx: &CancellationToken,
        user_id: UserId,
        image: &ImageSource,
    ) -> Result<BillId, ServiceError> {
        let result = self.recognize_image(ctx, user_id, image).await?;
        let bill_id = self
            .ledger
            .create_bill_from_recognition(user_id, &result, &image.image_path())
            .await?;
        Ok(bill_id)
    }

    async fn run_batch(
        &self,
        ctx: &CancellationToken,
        user_id: UserId,
        images: Vec<ImageSource>,
    ) -> Result<Vec<RecognitionOutcome>, ServiceError> {
        if images.is_empty() {
            return Err(ServiceError::EmptyBatch);
        }
        if images.len() > self.config.max_images {
            return Err(ServiceError::TooManyImages {
                max: self.config.max_images,
            });
        }

        let prompt: Arc<str> = Arc::from(self.prompt_for(user_id).await);
        let tasks: Vec<RecognitionTask> = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| RecognitionTask {
                index,
                image,
                prompt: prompt.clone(),
            })
            .collect();

        info!(user_id = %user_id, images = tasks.len(), "Starting batch recognition");
        Ok(self.pool.execute(ctx, tasks).await)
    }

    /// Prompt built from the user's categories, or the default one.
    async fn prompt_for(&self, user_id: UserId) -> String {
        match self.categories.get(user_id).await {
            Ok(categories) if !categories.is_empty() => build_prompt(&categories),
            Ok(_) => default_prompt(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to load categories, using default prompt");
                default_prompt()
            }
        }
    }

    async fn save_outcome(
        &self,
        user_id: UserId,
        outcome: RecognitionOutcome,
        image_path: &str,
    ) -> BatchSaveItem {
        let RecognitionOutcome {
            index,
            file_name,
            status,
            ..
        } = outcome;

        match status {
            OutcomeStatus::Success { data } => {
                match self
                    .ledger
                    .create_bill_from_recognition(user_id, &data, image_path)
                    .await
                {
                    Ok(bill_id) => BatchSaveItem {
                        index,
                        file_name,
                        recognized: true,
                        success: true,
                        bill_id: Some(bill_id),
                        error: None,
                    },
                    Err(e) => {
                        warn!(index, file_name = %file_name, error = %e, "Failed to save recognized bill");
                        BatchSaveItem {
                            index,
                            file_name,
                            recognized: true,
                            success: false,
                            bill_id: None,
                            error: Some(REASON_SAVE_FAILED.to_string()),
                        }
                    }
                }
            }
            OutcomeStatus::Failure { reason } => BatchSaveItem {
                index,
                file_name,
                recognized: false,
                success: false,
                bill_id: None,
                error: Some(reason),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledger_core::{BillType, Category};

    use crate::category::{CategoryService, CreateCategory};
    use crate::pool::REASON_TOO_LARGE;
    use crate::store::{CatalogError, CategoryCatalog, MemoryCatalog, MemoryLedger, StoreError};
    use crate::testing::{image, ScriptedRecognizer};

    const USER: UserId = UserId::new(7);

    struct BrokenCatalog;

    #[async_trait]
    impl CategoryCatalog for BrokenCatalog {
        async fn list_hierarchy_for_user(&self, _: UserId) -> Result<Vec<Category>, CatalogError> {
            Err(CatalogError::Unavailable("connection refused".into()))
        }
    }

    /// Ledger that refuses bills from one merchant.
    struct PickyLedger {
        inner: MemoryLedger,
        refuse: &'static str,
    }

    #[async_trait]
    impl LedgerStore for PickyLedger {
        async fn create_bill_from_recognition(
            &self,
            user_id: UserId,
            result: &RecognitionResult,
            image_path: &str,
        ) -> Result<BillId, StoreError> {
            if result.merchant == self.refuse {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner
                .create_bill_from_recognition(user_id, result, image_path)
                .await
        }
    }

    struct Fixture {
        service: RecognitionService,
        recognizer: Arc<ScriptedRecognizer>,
        catalog: Arc<MemoryCatalog>,
        ledger: Arc<MemoryLedger>,
    }

    fn fixture(config: Config) -> Fixture {
        let recognizer = ScriptedRecognizer::new();
        let catalog = Arc::new(MemoryCatalog::new());
        let cache = Arc::new(CategoryCache::new(catalog.clone()));
        let ledger = Arc::new(MemoryLedger::new(catalog.clone()));
        let service =
            RecognitionService::new(config, recognizer.clone(), cache, ledger.clone()).unwrap();
        Fixture {
            service,
            recognizer,
            catalog,
            ledger,
        }
    }

    fn fast_config() -> Config {
        Config {
            worker_count: 3,
            rpm: 6000,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let recognizer = ScriptedRecognizer::new();
        let catalog = Arc::new(MemoryCatalog::new());
        let cache = Arc::new(CategoryCache::new(catalog.clone()));
        let ledger = Arc::new(MemoryLedger::new(catalog));
        let config = Config {
            max_images: 0,
            ..Default::default()
        };
        assert!(RecognitionService::new(config, recognizer, cache, ledger).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_and_oversized_batches() {
        let f = fixture(Config {
            max_images: 2,
            ..fast_config()
        });
        let ctx = CancellationToken::new();

        let err = f.service.batch_recognize(&ctx, USER, Vec::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmptyBatch));
        assert_eq!(err.code(), 10002);

        let images = (0..3).map(|i| image(&format!("{}.png", i), "ok:a:0")).collect();
        let err = f.service.batch_recognize(&ctx, USER, images).await.unwrap_err();
        assert!(err.to_string().contains('2'));
        assert_eq!(f.recognizer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_batch_counts() {
        let f = fixture(fast_config());
        let images = vec![
            image("ok.png", "ok:Cafe:50"),
            image("huge.png", "ok:x:0").with_size(20 * 1024 * 1024),
            image("c.png", "err:unreadable receipt"),
        ];

        let result = f
            .service
            .batch_recognize(&CancellationToken::new(), USER, images)
            .await
            .unwrap();

        assert_eq!((result.total, result.success_count, result.fail_count), (3, 1, 2));
        assert_eq!(result.results[0].data.as_ref().unwrap().merchant, "Cafe");
        assert_eq!(result.results[1].error.as_deref(), Some(REASON_TOO_LARGE));
        assert_eq!(
            result.results[2].error.as_deref(),
            Some("recognition failed: unreadable receipt")
        );
        assert_eq!(f.recognizer.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_budget_carries_across_batches() {
        let f = fixture(Config {
            worker_count: 6,
            rpm: 60,
            task_timeout_secs: 60,
            ..Default::default()
        });
        assert_eq!(f.service.config().worker_count, 6);
        assert_eq!(f.service.limiter().burst(), 6);
        let ctx = CancellationToken::new();
        let batch = |prefix: &str| -> Vec<ImageSource> {
            (0..6).map(|i| image(&format!("{}{}.png", prefix, i), "ok:Cafe:0")).collect()
        };

        // The first batch spends the whole burst.
        let first = f.service.batch_recognize(&ctx, USER, batch("a")).await.unwrap();
        assert_eq!(first.success_count, 6);
        assert!(first.results.iter().all(|r| r.duration_ms < 100));

        // The second one waits for refills at one token per second.
        let second = f.service.batch_recognize(&ctx, USER, batch("b")).await.unwrap();
        assert_eq!(second.success_count, 6);
        assert!(second.results.iter().all(|r| r.duration_ms >= 900));
        let slowest = second.results.iter().map(|r| r.duration_ms).max().unwrap();
        assert!(slowest >= 5900, "slowest wait {}ms", slowest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_falls_back_to_default() {
        // No categories at all.
        let f = fixture(fast_config());
        f.service
            .batch_recognize(&CancellationToken::new(), USER, vec![image("a.png", "ok:a:0")])
            .await
            .unwrap();
        assert_eq!(f.recognizer.prompts(), vec![default_prompt()]);

        // Catalog failure.
        let recognizer = ScriptedRecognizer::new();
        let cache = Arc::new(CategoryCache::new(Arc::new(BrokenCatalog)));
        let ledger = Arc::new(MemoryLedger::new(Arc::new(MemoryCatalog::new())));
        let service = RecognitionService::new(fast_config(), recognizer.clone(), cache, ledger).unwrap();
        let result = service
            .batch_recognize(&CancellationToken::new(), USER, vec![image("a.png", "ok:a:0")])
            .await
            .unwrap();
        assert_eq!(result.success_count, 1);
        assert_eq!(recognizer.prompts(), vec![default_prompt()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_uses_user_categories() {
        let f = fixture(fast_config());
        let cache = Arc::new(CategoryCache::new(f.catalog.clone()));
        let categories = CategoryService::new(f.catalog.clone(), cache);
        let rent = categories
            .create(USER, CreateCategory::top_level("Housing", BillType::Expense))
            .await
            .unwrap();
        categories
            .create(USER, CreateCategory::child_of(rent.id, "Rent"))
            .await
            .unwrap();

        let images = vec![image("a.png", "ok:a:0"), image("b.png", "ok:b:0")];
        f.service
            .batch_recognize(&CancellationToken::new(), USER, images)
            .await
            .unwrap();

        let prompts = f.recognizer.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        assert!(prompts[0].contains("- Housing (expense): Rent"));
        assert_ne!(prompts[0], default_prompt());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_is_isolated() {
        let recognizer = ScriptedRecognizer::new();
        let catalog = Arc::new(MemoryCatalog::new());
        let cache = Arc::new(CategoryCache::new(catalog.clone()));
        let ledger = Arc::new(PickyLedger {
            inner: MemoryLedger::new(catalog),
            refuse: "Bad Shop",
        });
        let service =
            RecognitionService::new(fast_config(), recognizer, cache, ledger.clone()).unwrap();

        let images = vec![
            image("one.png", "ok:Good Shop:30"),
            image("two.png", "ok:Bad Shop:10"),
            image("three.png", "err:blurry"),
            image("four.png", "ok:Other Shop:0"),
        ];
        let result = service
            .batch_recognize_and_save(&CancellationToken::new(), USER, images)
            .await
            .unwrap();

        assert_eq!((result.total, result.success_count, result.fail_count), (4, 2, 2));
        let items = &result.results;
        assert!(items[0].success && items[0].bill_id.is_some());
        assert!(items[1].recognized && !items[1].success);
        assert_eq!(items[1].error.as_deref(), Some(REASON_SAVE_FAILED));
        assert!(!items[2].recognized);
        assert_eq!(items[2].error.as_deref(), Some("recognition failed: blurry"));
        assert!(items[3].success);

        let bills = ledger.inner.bills_for_user(USER).await;
        let paths: Vec<_> = bills.iter().map(|b| b.image_path.as_str()).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"one.png") && paths.contains(&"four.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognize_image_validates_before_token() {
        let f = fixture(Config {
            rpm: 1,
            ..Default::default()
        });
        let ctx = CancellationToken::new();

        let huge = image("huge.png", "ok:a:0").with_size(11 * 1024 * 1024);
        let err = f.service.recognize_image(&ctx, USER, &huge).await.unwrap_err();
        assert_eq!(err.code(), 50002);

        let bmp = ImageSource::from_bytes("a.bmp", "image/bmp", b"ok:a:0".to_vec());
        let err = f.service.recognize_image(&ctx, USER, &bmp).await.unwrap_err();
        assert_eq!(err.code(), 50003);

        // Burst of one: the single token is still there.
        let result = f
            .service
            .recognize_image(&ctx, USER, &image("a.png", "ok:Deli:0"))
            .await
            .unwrap();
        assert_eq!(result.merchant, "Deli");

        let err = f
            .service
            .recognize_image(&ctx, USER, &image("b.png", "ok:Deli:0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TooManyRequests));
        assert_eq!(err.code(), 10004);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognize_image_timeout() {
        let f = fixture(Config {
            task_timeout_secs: 2,
            ..fast_config()
        });
        let err = f
            .service
            .recognize_image(&CancellationToken::new(), USER, &image("a.png", "hang"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognize_and_save() {
        let f = fixture(fast_config());
        let bill_id = f
            .service
            .recognize_and_save(&CancellationToken::new(), USER, &image("r.png", "ok:Metro:0"))
            .await
            .unwrap();

        let bill = f.ledger.get(bill_id).await.unwrap();
        assert_eq!(bill.merchant, "Metro");
        assert_eq!(bill.user_id, USER);
        assert_eq!(bill.image_path, "r.png");
    }
}
