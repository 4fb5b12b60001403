use crate::error::FlowError;
use crate::flows::client::GenAiClient;
use crate::flows::records::AnalyticsRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeFarmDataInput {
    #[serde(rename = "analyticsData")]
    pub analytics_data: Vec<AnalyticsRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub problem: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeFarmDataOutput {
    pub insights: Vec<Insight>,
    pub summary: String,
}

pub struct AnalyzeFarmDataFlow {
    client: Arc<GenAiClient>,
}

impl AnalyzeFarmDataFlow {
    pub fn new(client: Arc<GenAiClient>) -> Self {
        Self { client }
    }

    pub fn prompt(input: &AnalyzeFarmDataInput) -> Result<String, FlowError> {
        Ok(format!(
            r#"You are an expert agronomist providing analysis of farm data.
The user has provided a JSON object containing analytics data from their farm.
Analyze the data to identify potential problems and provide actionable recommendations.
Provide a summary of the overall farm health.

Data:
{analytics}

Respond with a JSON object of the form {{"insights": [{{"problem": string, "recommendation": string}}], "summary": string}}."#,
            analytics = serde_json::to_string_pretty(&input.analytics_data)?,
        ))
    }

    #[instrument(skip_all, fields(records = input.analytics_data.len()))]
    pub async fn run(&self, input: AnalyzeFarmDataInput) -> Result<AnalyzeFarmDataOutput, FlowError> {
        let prompt = Self::prompt(&input)?;
        self.client.generate_json(&prompt).await
    }
}
