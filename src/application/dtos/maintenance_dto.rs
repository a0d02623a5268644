use serde::{Deserialize, Serialize};

/// Outcome of a bulk cleanup operation.
///
/// Cleanup operations report failures here instead of returning an error so
/// the periodic caller keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    pub successful: bool,
    pub message: String,
    pub count_removed: u64,
}

impl CleanupResult {
    pub fn success<S: Into<String>>(count_removed: u64, message: S) -> Self {
        Self {
            successful: true,
            message: message.into(),
            count_removed,
        }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self {
            successful: false,
            message: message.into(),
            count_removed: 0,
        }
    }

    /// Folds several results into one: successful only if all were
    pub fn combine(results: Vec<CleanupResult>) -> Self {
        let successful = results.iter().all(|r| r.successful);
        let count_removed = results.iter().map(|r| r.count_removed).sum();
        let message = results
            .iter()
            .map(|r| r.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            successful,
            message,
            count_removed,
        }
    }
}
