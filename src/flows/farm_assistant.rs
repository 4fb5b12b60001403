use crate::error::FlowError;
use crate::flows::client::GenAiClient;
use crate::flows::records::{AnalyticsRecord, TaskRecord};
use crate::flows::ConversationalFlow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmAssistantInput {
    pub question: String,
    pub tasks: Vec<TaskRecord>,
    #[serde(rename = "analyticsData")]
    pub analytics_data: Vec<AnalyticsRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmAssistantOutput {
    pub answer: String,
}

/// Answers free-form questions about the farm using the user's tasks and
/// analytics as context.
pub struct FarmAssistantFlow {
    client: Arc<GenAiClient>,
}

impl FarmAssistantFlow {
    pub fn new(client: Arc<GenAiClient>) -> Self {
        Self { client }
    }

    pub fn prompt(input: &FarmAssistantInput) -> Result<String, FlowError> {
        Ok(format!(
            r#"You are a helpful AI farm assistant. Your role is to answer questions from farmers about their farm's data.
You will be provided with the user's current tasks and analytics data in JSON format.
Use this data to provide an accurate and helpful answer to the user's question.
Keep your answers concise and easy to understand for a non-technical audience.

Here is the user's data:
Tasks:
{tasks}

Analytics Data:
{analytics}

Here is the user's question:
"{question}"

Respond with a JSON object of the form {{"answer": string}}."#,
            tasks = serde_json::to_string_pretty(&input.tasks)?,
            analytics = serde_json::to_string_pretty(&input.analytics_data)?,
            question = input.question,
        ))
    }
}

#[async_trait]
impl ConversationalFlow for FarmAssistantFlow {
    #[instrument(skip_all)]
    async fn answer(&self, input: FarmAssistantInput) -> Result<FarmAssistantOutput, FlowError> {
        let prompt = Self::prompt(&input)?;
        self.client.generate_json(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::records::{sample_analytics, sample_tasks};
    use crate::testing::serve_once;

    fn input() -> FarmAssistantInput {
        FarmAssistantInput {
            question: "Which field needs water?".to_string(),
            tasks: sample_tasks(),
            analytics_data: sample_analytics(),
        }
    }

    #[test]
    fn input_serializes_analytics_under_camel_case_key() {
        let value = serde_json::to_value(input()).unwrap();
        assert!(value.get("analyticsData").is_some());
        assert!(value.get("analytics_data").is_none());
    }

    #[test]
    fn prompt_embeds_question_and_records() {
        let prompt = FarmAssistantFlow::prompt(&input()).unwrap();
        assert!(prompt.contains("\"Which field needs water?\""));
        assert!(prompt.contains("\"task_name\": \"Irrigate\""));
        assert!(prompt.contains("\"crop_type\": \"Maize\""));
        assert!(prompt.contains(r#"{"answer": string}"#));
    }

    #[tokio::test]
    async fn answer_comes_from_the_model() {
        let (url, _request) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"answer\":\"North Field\"}"}]}}]}"#,
        )
        .await;
        let client = Arc::new(GenAiClient::new(Some("k".to_string())).with_endpoint(url));
        let flow = FarmAssistantFlow::new(client);

        let output = flow.answer(input()).await.unwrap();

        assert_eq!(output.answer, "North Field");
    }
}
