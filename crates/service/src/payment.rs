//! Payment readiness validation
//!
//! Runs before any data is sent: balance check, allowance check, optional
//! allowance auto-configuration, then capacity validation against the
//! archive size. A blocked result is terminal and requires user action
//! (funding the account); it is not a transient failure and the pipeline
//! must not create a storage context after one.

use serde::Serialize;

use crate::error::UploadError;
use crate::market::StorageMarket;
use crate::progress::{ProgressSink, ProgressStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    Ready,
    Blocked,
}

/// Per-check figures for stage-specific caller feedback
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationDetails {
    pub balance: Option<u128>,
    pub required: Option<u128>,
    pub allowance_sufficient: Option<bool>,
    pub max_upload_size: Option<u64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResult {
    pub status: ReadinessStatus,
    pub validation: ValidationDetails,
    pub suggestions: Vec<String>,
}

impl ReadinessResult {
    fn blocked(
        validation: ValidationDetails,
        message: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        let mut validation = validation;
        validation.error_message = Some(message.into());
        Self {
            status: ReadinessStatus::Blocked,
            validation,
            suggestions,
        }
    }
}

/// Validate that the account can pay for a deal of `file_size_bytes`.
///
/// Market errors during the checks are transient network failures; a
/// `Blocked` result is a deliberate verdict, returned as a value so the
/// caller decides how to surface it.
pub async fn check_readiness(
    market: &dyn StorageMarket,
    file_size_bytes: u64,
    auto_configure_allowances: bool,
    progress: &ProgressSink,
) -> Result<ReadinessResult, UploadError> {
    let mut validation = ValidationDetails::default();

    progress.confirmed(
        ProgressStage::ValidatingPayment,
        0,
        "checking account balance",
    );
    let balance = market.balance().await?;
    let required = market.estimate_cost(file_size_bytes).await?;
    validation.balance = Some(balance.available);
    validation.required = Some(required);
    if balance.available < required {
        return Ok(ReadinessResult::blocked(
            validation,
            "insufficient balance for this storage deal",
            vec!["top up balance".to_string()],
        ));
    }

    progress.confirmed(
        ProgressStage::ValidatingPayment,
        33,
        "checking spending allowances",
    );
    let mut allowances = market.allowances(required).await?;
    if !allowances.sufficient && auto_configure_allowances {
        progress.confirmed(
            ProgressStage::ValidatingPayment,
            50,
            "configuring spending allowances",
        );
        market.approve_allowances(required).await?;
        allowances = market.allowances(required).await?;
    }
    validation.allowance_sufficient = Some(allowances.sufficient);
    if !allowances.sufficient {
        return Ok(ReadinessResult::blocked(
            validation,
            "spending allowances are not configured for this storage deal",
            vec!["approve storage allowances for the uploading account".to_string()],
        ));
    }

    progress.confirmed(
        ProgressStage::ValidatingPayment,
        66,
        "validating storage capacity",
    );
    let max_upload_size = market.max_upload_size().await?;
    validation.max_upload_size = Some(max_upload_size);
    if file_size_bytes > max_upload_size {
        return Ok(ReadinessResult::blocked(
            validation,
            format!(
                "file size {} exceeds the maximum upload size {}",
                file_size_bytes, max_upload_size
            ),
            vec!["split the recording into smaller segments".to_string()],
        ));
    }

    progress.confirmed(ProgressStage::ValidatingPayment, 100, "payment ready");
    Ok(ReadinessResult {
        status: ReadinessStatus::Ready,
        validation,
        suggestions: Vec::new(),
    })
}
