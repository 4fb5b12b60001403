//! Generative-AI flows: the chat assistant plus the analytics helpers.

pub mod analyze_farm_data;
pub mod client;
pub mod farm_assistant;
pub mod predict_yield;
pub mod records;

pub use analyze_farm_data::{AnalyzeFarmDataFlow, AnalyzeFarmDataInput, AnalyzeFarmDataOutput, Insight};
pub use client::GenAiClient;
pub use farm_assistant::{FarmAssistantFlow, FarmAssistantInput, FarmAssistantOutput};
pub use predict_yield::{PredictYieldFlow, PredictYieldInput, PredictYieldOutput};
pub use records::{AnalyticsRecord, FarmRecords, TaskRecord};

use crate::error::FlowError;
use async_trait::async_trait;

/// Answers one chat question. Implementations do not retry.
#[async_trait]
pub trait ConversationalFlow: Send + Sync {
    async fn answer(&self, input: FarmAssistantInput) -> Result<FarmAssistantOutput, FlowError>;
}
