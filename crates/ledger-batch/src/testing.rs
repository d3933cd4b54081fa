//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledger_core::{BillType, RecognitionResult};
use ledger_vision::{Recognizer, VisionError};

use crate::task::{ImageSource, RecognitionTask};

/// Recognizer driven by the image bytes themselves.
///
/// The payload is a command:
/// - `ok:<merchant>:<delay_ms>` succeeds after the delay, echoing the merchant
/// - `err:<message>` fails with the message
/// - `hang` never completes
/// - `panic` panics
#[derive(Default)]
pub struct ScriptedRecognizer {
    calls: AtomicUsize,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        image: &[u8],
        _mime_type: &str,
        prompt: &str,
    ) -> Result<RecognitionResult, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let command = String::from_utf8_lossy(image).into_owned();
        let mut parts = command.splitn(3, ':');
        match parts.next() {
            Some("ok") => {
                let merchant = parts.next().unwrap_or_default().to_string();
                let delay_ms: u64 = parts.next().and_then(|d| d.parse().ok()).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(receipt(&merchant))
            }
            Some("err") => Err(VisionError::Failed(
                parts.next().unwrap_or_default().to_string(),
            )),
            Some("hang") => std::future::pending().await,
            Some("panic") => panic!("recognizer blew up"),
            _ => Err(VisionError::Failed(format!("unknown command {}", command))),
        }
    }
}

/// A plausible recognition result for `merchant`.
pub fn receipt(merchant: &str) -> RecognitionResult {
    RecognitionResult {
        platform: "WeChat Pay".to_string(),
        amount: 25.5,
        merchant: merchant.to_string(),
        bill_type: BillType::Expense,
        category: "Food".to_string(),
        sub_category: "Coffee & Drinks".to_string(),
        pay_time: "2024-01-15T10:30:00+08:00".to_string(),
        confidence: 0.9,
        ..Default::default()
    }
}

/// In-memory PNG image whose bytes are a recognizer command.
pub fn image(name: &str, command: &str) -> ImageSource {
    ImageSource::from_bytes(name, "image/png", command.as_bytes().to_vec())
}

pub fn tasks(images: Vec<ImageSource>, prompt: &str) -> Vec<RecognitionTask> {
    let prompt: Arc<str> = Arc::from(prompt);
    images
        .into_iter()
        .enumerate()
        .map(|(index, image)| RecognitionTask {
            index,
            image,
            prompt: prompt.clone(),
        })
        .collect()
}
