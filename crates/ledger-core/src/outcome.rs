//! Per-image outcomes and the batch responses built from them.

use serde::{Deserialize, Serialize};

use crate::{BillId, RecognitionResult};

/// How a single recognition task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    /// The recognizer returned a structured result.
    Success { data: RecognitionResult },
    /// Any failure along the way, as a human-readable reason.
    Failure { reason: String },
}

/// Outcome of one recognition task, correlated to its input position.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutcome {
    /// Position of the image in the submitted batch.
    pub index: usize,

    /// Original file name of the image.
    pub file_name: String,

    /// Wall time spent on the task, in milliseconds.
    pub duration_ms: u64,

    pub status: OutcomeStatus,
}

impl RecognitionOutcome {
    pub fn success(
        index: usize,
        file_name: impl Into<String>,
        data: RecognitionResult,
        duration_ms: u64,
    ) -> Self {
        Self {
            index,
            file_name: file_name.into(),
            duration_ms,
            status: OutcomeStatus::Success { data },
        }
    }

    pub fn failure(
        index: usize,
        file_name: impl Into<String>,
        reason: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            index,
            file_name: file_name.into(),
            duration_ms,
            status: OutcomeStatus::Failure {
                reason: reason.into(),
            },
        }
    }

    /// Returns true if recognition succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// Failure reason, if the task failed.
    pub fn reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Failure { reason } => Some(reason),
            OutcomeStatus::Success { .. } => None,
        }
    }
}

/// One entry of a [`BatchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub index: usize,
    pub file_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RecognitionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Processing time in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

impl From<RecognitionOutcome> for BatchItem {
    fn from(outcome: RecognitionOutcome) -> Self {
        let (success, data, error) = match outcome.status {
            OutcomeStatus::Success { data } => (true, Some(data), None),
            OutcomeStatus::Failure { reason } => (false, None, Some(reason)),
        };
        Self {
            index: outcome.index,
            file_name: outcome.file_name,
            success,
            data,
            error,
            duration_ms: outcome.duration_ms,
        }
    }
}

/// Response of a batch recognition. `results[i]` answers image `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub results: Vec<BatchItem>,
}

impl BatchResult {
    /// Build a response from ordered outcomes, keeping their order.
    pub fn from_outcomes(outcomes: Vec<RecognitionOutcome>) -> Self {
        let results: Vec<BatchItem> = outcomes.into_iter().map(BatchItem::from).collect();
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            success_count,
            fail_count: results.len() - success_count,
            results,
        }
    }
}

/// One entry of a [`BatchSaveResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSaveItem {
    pub index: usize,
    pub file_name: String,

    /// Whether recognition itself succeeded, independent of the save.
    pub recognized: bool,

    /// Recognized and persisted.
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<BillId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of a batch recognition followed by per-item persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSaveResult {
    pub total: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub results: Vec<BatchSaveItem>,
}

impl BatchSaveResult {
    pub fn from_items(results: Vec<BatchSaveItem>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            success_count,
            fail_count: results.len() - success_count,
            results,
        }
    }
}
