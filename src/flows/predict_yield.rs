use crate::error::FlowError;
use crate::flows::client::GenAiClient;
use crate::flows::records::AnalyticsRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictYieldInput {
    #[serde(rename = "analyticsData")]
    pub analytics_data: Vec<AnalyticsRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictYieldOutput {
    /// Includes units, e.g. "4.2 tons/acre".
    pub predicted_yield: String,
    pub yield_confidence: String,
    pub next_month_growth_prediction: String,
    pub prediction_summary: String,
}

pub struct PredictYieldFlow {
    client: Arc<GenAiClient>,
}

impl PredictYieldFlow {
    pub fn new(client: Arc<GenAiClient>) -> Self {
        Self { client }
    }

    pub fn prompt(input: &PredictYieldInput) -> Result<String, FlowError> {
        Ok(format!(
            r#"You are an expert agricultural data scientist specializing in yield prediction.
Based on the provided time-series analytics data, predict the likely crop yield for this season.
Also provide a forecast for crop growth over the next month.
Your prediction should be based on the trends in the data (e.g., changes in soil moisture, temperature, canopy cover) and the current parameters.
Provide a summary explaining your reasoning.

Data:
{analytics}

Respond with a JSON object with the string fields "predicted_yield" (including units), "yield_confidence" (High, Medium or Low), "next_month_growth_prediction" and "prediction_summary"."#,
            analytics = serde_json::to_string_pretty(&input.analytics_data)?,
        ))
    }

    #[instrument(skip_all, fields(records = input.analytics_data.len()))]
    pub async fn run(&self, input: PredictYieldInput) -> Result<PredictYieldOutput, FlowError> {
        let prompt = Self::prompt(&input)?;
        self.client.generate_json(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::records::sample_analytics;
    use crate::testing::serve_once;

    #[tokio::test]
    async fn prediction_round_trips_through_the_model() {
        let (url, request) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"predicted_yield\":\"4.2 tons/acre\",\"yield_confidence\":\"Medium\",\"next_month_growth_prediction\":\"Steady\",\"prediction_summary\":\"Moisture is stable\"}"}]}}]}"#,
        )
        .await;
        let client = Arc::new(GenAiClient::new(Some("k".to_string())).with_endpoint(url));

        let output = PredictYieldFlow::new(client)
            .run(PredictYieldInput {
                analytics_data: sample_analytics(),
            })
            .await
            .unwrap();

        assert_eq!(output.predicted_yield, "4.2 tons/acre");
        assert_eq!(output.yield_confidence, "Medium");
        assert!(request.await.unwrap().contains("yield prediction"));
    }

    #[tokio::test]
    async fn non_json_answer_is_malformed() {
        let (url, _request) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"I cannot predict that."}]}}]}"#,
        )
        .await;
        let client = Arc::new(GenAiClient::new(Some("k".to_string())).with_endpoint(url));

        let result = PredictYieldFlow::new(client)
            .run(PredictYieldInput {
                analytics_data: Vec::new(),
            })
            .await;

        assert!(matches!(result, Err(FlowError::MalformedResponse(_))));
    }
}
