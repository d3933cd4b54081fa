//! Bounded pool of recognition workers.
//!
//! A batch is pushed onto one queue and drained by a fixed set of workers.
//! Each worker writes the outcome of a task into the slot at the task's
//! index, so the returned outcomes line up with the input whatever order the
//! tasks finish in.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use ledger_core::RecognitionOutcome;
use ledger_vision::Recognizer;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{Deadline, Interrupt};
use crate::limiter::RateLimiter;
use crate::task::{is_supported_content_type, RecognitionTask};

pub const REASON_RATE_LIMITED: &str = "rate limited, retry later";
pub const REASON_TOO_LARGE: &str = "image too large";
pub const REASON_UNSUPPORTED: &str = "unsupported image format";
pub const REASON_READ_FAILED: &str = "failed to read image";
pub const REASON_TIMED_OUT: &str = "recognition timed out";
pub const REASON_CANCELLED: &str = "recognition cancelled";
pub const REASON_NOT_PROCESSED: &str = "task was not processed";

type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<RecognitionTask>>>;
type Slots = Arc<[OnceLock<RecognitionOutcome>]>;

/// Runs batches of recognition tasks with bounded concurrency.
#[derive(Clone)]
pub struct WorkerPool {
    worker_count: usize,
    limiter: Arc<RateLimiter>,
    task_timeout: Duration,
    recognizer: Arc<dyn Recognizer>,
    max_image_bytes: u64,
}

impl WorkerPool {
    pub fn new(
        worker_count: usize,
        limiter: Arc<RateLimiter>,
        task_timeout: Duration,
        recognizer: Arc<dyn Recognizer>,
        max_image_bytes: u64,
    ) -> Self {
        Self {
            worker_count: worker_count.max(1),
            limiter,
            task_timeout,
            recognizer,
            max_image_bytes,
        }
    }

    /// Run every task and return one outcome per task, in input order.
    ///
    /// Cancelling `parent` makes in-flight and unstarted tasks fail quickly;
    /// the result still has one entry per task.
    pub async fn execute(
        &self,
        parent: &CancellationToken,
        tasks: Vec<RecognitionTask>,
    ) -> Vec<RecognitionOutcome> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let file_names: Vec<String> = tasks.iter().map(|t| t.image.file_name.clone()).collect();
        let slots: Slots = (0..total).map(|_| OnceLock::new()).collect();

        let (tx, rx) = mpsc::unbounded_channel();
        for task in tasks {
            // The receiver is alive until the workers below finish.
            let _ = tx.send(task);
        }
        drop(tx);
        let queue: TaskQueue = Arc::new(Mutex::new(rx));

        let workers = self.worker_count.min(total);
        debug!(tasks = total, workers, "Starting recognition workers");

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let pool = self.clone();
            let queue = queue.clone();
            let slots = slots.clone();
            let parent = parent.clone();
            handles.push(tokio::spawn(async move {
                pool.run_worker(worker_id, queue, slots, parent).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Recognition worker stopped abnormally");
            }
        }

        slots
            .iter()
            .zip(file_names)
            .enumerate()
            .map(|(index, (slot, file_name))| match slot.get() {
                Some(outcome) => outcome.clone(),
                None => RecognitionOutcome::failure(index, file_name, REASON_NOT_PROCESSED, 0),
            })
            .collect()
    }

    async fn run_worker(
        &self,
        worker_id: usize,
        queue: TaskQueue,
        slots: Slots,
        parent: CancellationToken,
    ) {
        loop {
            let next = queue.lock().await.recv().await;
            let Some(task) = next else {
                break;
            };

            let index = task.index;
            let outcome = self.process(&parent, task).await;
            if let Some(reason) = outcome.reason() {
                warn!(
                    worker = worker_id,
                    index,
                    file_name = %outcome.file_name,
                    reason,
                    "Recognition task failed"
                );
            }

            match slots.get(index) {
                Some(slot) => {
                    if slot.set(outcome).is_err() {
                        warn!(index, "Duplicate outcome for task, keeping the first");
                    }
                }
                None => warn!(index, total = slots.len(), "Task index out of range"),
            }
        }
    }

    async fn process(&self, parent: &CancellationToken, task: RecognitionTask) -> RecognitionOutcome {
        let started = Instant::now();
        let deadline = Deadline::new(parent, self.task_timeout);
        let RecognitionTask {
            index,
            image,
            prompt,
        } = task;
        let fail = |reason: &str| {
            RecognitionOutcome::failure(index, image.file_name.clone(), reason, elapsed_ms(started))
        };

        if self.limiter.wait(&deadline).await.is_err() {
            return fail(REASON_RATE_LIMITED);
        }

        if image.size > self.max_image_bytes {
            return fail(REASON_TOO_LARGE);
        }

        if !is_supported_content_type(&image.content_type) {
            return fail(REASON_UNSUPPORTED);
        }

        let bytes = match deadline.run(image.read()).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                debug!(index, error = %e, "Failed to read image");
                return fail(REASON_READ_FAILED);
            }
            Err(interrupt) => return fail(interrupt_reason(interrupt)),
        };

        let call = self
            .recognizer
            .recognize(&bytes, &image.content_type, &prompt);
        match deadline.run(call).await {
            Ok(Ok(data)) => {
                let duration_ms = elapsed_ms(started);
                info!(index, file_name = %image.file_name, duration_ms, "Image recognized");
                RecognitionOutcome::success(index, image.file_name.clone(), data, duration_ms)
            }
            Ok(Err(e)) => fail(&e.to_string()),
            Err(interrupt) => fail(interrupt_reason(interrupt)),
        }
    }
}

fn interrupt_reason(interrupt: Interrupt) -> &'static str {
    match interrupt {
        Interrupt::Cancelled => REASON_CANCELLED,
        Interrupt::TimedOut => REASON_TIMED_OUT,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
