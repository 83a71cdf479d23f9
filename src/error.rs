//! Error types for task-campaign-client

use thiserror::Error;
use wasm_bindgen::prelude::*;

use crate::lifecycle::ExtrinsicStatus;

/// Main error type for campaign client operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CampaignError {
    /// Transport-level failure talking to the node
    #[error("Connection error: {0}")]
    Connection(String),
    /// Secret phrase could not be turned into an identity
    #[error("Invalid phrase: {0}")]
    InvalidPhrase(String),
    /// Decimal exponent outside the defined domain
    #[error("Invalid exponent: {0}")]
    InvalidExponent(i64),
    /// Fractional part does not fit below 10^exponent
    #[error("Fractional part {fractional} out of range for exponent {exponent}")]
    FractionOutOfRange { fractional: String, exponent: u32 },
    /// Malformed decimal amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    /// Invalid SS58 address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// Bad client configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    /// Step list is malformed
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),
    /// Call could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// Chain state query failed
    #[error("Query error: {0}")]
    Query(String),
    /// Status delivered out of lifecycle order
    #[error("Illegal status transition from {} to {to}", display_from(.from))]
    IllegalTransition {
        from: Option<ExtrinsicStatus>,
        to: ExtrinsicStatus,
    },
    /// Status stream ended before a terminal status
    #[error("Status stream for {extrinsic} closed before a terminal status")]
    StreamClosed { extrinsic: String },
    /// A blocking step ended in a failure status
    #[error("Workflow aborted at step {failed_step}: {last_status}")]
    WorkflowAborted {
        failed_step: usize,
        last_status: ExtrinsicStatus,
    },
    /// Two in-flight extrinsics from one signer would share a nonce
    #[error("Nonce collision for {signer}: nonce {nonce} is still in flight")]
    NonceCollision { signer: String, nonce: u32 },
    /// Finalized createCampaign step emitted no campaign for its signer
    #[error("No campaign created by step {step}")]
    CampaignNotFound { step: usize },
    /// Call refers to a campaign whose index has not been discovered
    #[error("No campaign index known for step {step}")]
    UnresolvedCampaign { step: usize },
    /// Workflow abandoned between steps
    #[error("Workflow cancelled before step {next_step}")]
    Cancelled { next_step: usize },
    /// Any other failure raised while a step was being submitted or observed
    #[error("Step {step} failed: {source}")]
    StepFailed {
        step: usize,
        source: Box<CampaignError>,
    },
}

fn display_from(from: &Option<ExtrinsicStatus>) -> String {
    match from {
        Some(status) => status.to_string(),
        None => "<none>".to_string(),
    }
}

impl CampaignError {
    /// Whether the error comes from the ledger rejecting an extrinsic
    pub fn is_ledger_rejection(&self) -> bool {
        matches!(self, CampaignError::WorkflowAborted { .. })
    }

    /// 1-based workflow step the error is attributed to
    pub fn step(&self) -> Option<usize> {
        match self {
            CampaignError::StepFailed { step, .. } | CampaignError::CampaignNotFound { step } => {
                Some(*step)
            }
            CampaignError::WorkflowAborted { failed_step, .. } => Some(*failed_step),
            CampaignError::Cancelled { next_step } => Some(*next_step),
            _ => None,
        }
    }

    /// Error with its step attached, unless it already names one
    pub fn at_step(self, step: usize) -> Self {
        if self.step().is_some() {
            return self;
        }
        CampaignError::StepFailed {
            step,
            source: Box::new(self),
        }
    }

    /// Underlying error of a step failure
    pub fn root_cause(&self) -> &CampaignError {
        match self {
            CampaignError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for CampaignError {
    fn from(err: serde_json::Error) -> Self {
        CampaignError::InvalidConfig(err.to_string())
    }
}

// REQUIRED: Converts to JS Error with stack trace
impl From<CampaignError> for JsValue {
    fn from(err: CampaignError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CampaignError::InvalidAddress("bad address".to_string());
        assert_eq!(err.to_string(), "Invalid address: bad address");
    }

    #[test]
    fn test_aborted_display_names_step_and_status() {
        let err = CampaignError::WorkflowAborted {
            failed_step: 2,
            last_status: ExtrinsicStatus::Invalid,
        };
        assert_eq!(err.to_string(), "Workflow aborted at step 2: invalid");
        assert!(err.is_ledger_rejection());
    }

    #[test]
    fn test_illegal_transition_without_previous() {
        let err = CampaignError::IllegalTransition {
            from: None,
            to: ExtrinsicStatus::Broadcast,
        };
        assert_eq!(
            err.to_string(),
            "Illegal status transition from <none> to broadcast"
        );
    }

    #[test]
    fn test_at_step_wraps_step_less_errors_once() {
        let err = CampaignError::Query("timeout".to_string()).at_step(3);
        assert_eq!(err.step(), Some(3));
        assert_eq!(err.to_string(), "Step 3 failed: Query error: timeout");
        assert_eq!(err.root_cause(), &CampaignError::Query("timeout".to_string()));
        assert_eq!(err.clone().at_step(1), err);

        let found = CampaignError::CampaignNotFound { step: 1 }.at_step(2);
        assert_eq!(found, CampaignError::CampaignNotFound { step: 1 });
    }
}
