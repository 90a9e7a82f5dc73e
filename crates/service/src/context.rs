//! Storage context negotiation
//!
//! Binds the session to a provider and dataset. Runs strictly after
//! readiness validation passes; a context created before validating
//! payment risks provider-side errors that are harder to diagnose than a
//! pre-flight payment failure.

use std::sync::Arc;

use crate::error::{StageExt, UploadError};
use crate::market::{DatasetId, ProviderInfo, StorageContext, StorageMarket};
use crate::progress::{ProgressSink, ProgressStage};

pub struct BoundContext {
    pub context: Arc<dyn StorageContext>,
    pub provider: ProviderInfo,
}

/// Negotiate a storage context, reusing `existing_dataset_id` when supplied
/// so repeated uploads accumulate in one logical collection.
pub async fn create_context(
    market: &dyn StorageMarket,
    existing_dataset_id: Option<DatasetId>,
    progress: &ProgressSink,
) -> Result<BoundContext, UploadError> {
    progress.confirmed(
        ProgressStage::CreatingContext,
        0,
        match existing_dataset_id {
            Some(_) => "binding to existing dataset",
            None => "provisioning storage dataset",
        },
    );

    let context = market
        .create_context(existing_dataset_id)
        .await
        .stage("storage context creation")?;
    let provider = context.provider_info();

    progress.confirmed(
        ProgressStage::CreatingContext,
        100,
        format!("storage context ready with provider {}", provider.name),
    );
    tracing::info!(
        dataset_id = %context.dataset_id(),
        provider = %provider.name,
        "storage context bound"
    );

    Ok(BoundContext { context, provider })
}
