//! Fulfillment outcomes and job states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::{OrderId, OrderStatus, ProductId};

/// What to do when some stock decrements succeed and others fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartialFailurePolicy {
    /// Re-increment the lines that were decremented and fail the order.
    #[default]
    Compensate,
    /// Log the failed lines and mark the order processed anyway.
    Tolerate,
}

impl PartialFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartialFailurePolicy::Compensate => "compensate",
            PartialFailurePolicy::Tolerate => "tolerate",
        }
    }
}

impl std::fmt::Display for PartialFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PartialFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compensate" => Ok(PartialFailurePolicy::Compensate),
            "tolerate" => Ok(PartialFailurePolicy::Tolerate),
            other => Err(format!("unknown partial failure policy: {other}")),
        }
    }
}

/// Why fulfillment failed an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The first line whose stock check did not pass. Later lines were not
    /// checked.
    InsufficientStock { product_id: ProductId },
    /// Some decrements failed. `compensated` lists the lines whose
    /// decrement was reversed.
    PartialDecrement {
        failed: Vec<ProductId>,
        compensated: Vec<ProductId>,
    },
}

/// Result of one fulfillment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    /// Stock was decremented and the order marked `processed`.
    /// `failed_decrements` is only non-empty under the tolerate policy.
    Processed { failed_decrements: Vec<ProductId> },
    /// The order was marked `failed`.
    Failed(FailureReason),
    /// The order was no longer `pending`; nothing was touched.
    Skipped { status: OrderStatus },
    /// The order was deleted before the job ran.
    OrderMissing,
}

impl FulfillmentOutcome {
    /// Label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            FulfillmentOutcome::Processed { .. } => "processed",
            FulfillmentOutcome::Failed(_) => "failed",
            FulfillmentOutcome::Skipped { .. } => "skipped",
            FulfillmentOutcome::OrderMissing => "order_missing",
        }
    }
}

/// Lifecycle of a queued fulfillment job.
///
/// ```text
/// Queued ──► Running ──┬──► Completed
///                      └──► Errored
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed { result: FulfillmentOutcome },
    /// The run aborted on a storage error before reaching an outcome.
    Errored { error: String },
}

impl JobState {
    /// Returns true once the job will not change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Errored { .. })
    }
}

/// A fulfillment job as exposed for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!(
            "Tolerate".parse::<PartialFailurePolicy>(),
            Ok(PartialFailurePolicy::Tolerate)
        );
        assert_eq!(
            " compensate ".parse::<PartialFailurePolicy>(),
            Ok(PartialFailurePolicy::Compensate)
        );
        assert!("retry".parse::<PartialFailurePolicy>().is_err());
        assert_eq!(PartialFailurePolicy::default(), PartialFailurePolicy::Compensate);
    }

    #[test]
    fn job_serializes_state_inline() {
        let job = Job {
            order_id: OrderId::new(3),
            state: JobState::Completed {
                result: FulfillmentOutcome::Failed(FailureReason::InsufficientStock {
                    product_id: ProductId::new(1),
                }),
            },
            enqueued_at: Utc::now(),
            finished_at: None,
        };

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["order_id"], 3);
        assert_eq!(json["state"], "completed");
        assert_eq!(json["result"]["outcome"], "failed");
        assert_eq!(json["result"]["reason"], "insufficient_stock");
        assert_eq!(json["result"]["product_id"], 1);
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(
            JobState::Errored {
                error: "db down".to_string()
            }
            .is_terminal()
        );
    }
}
