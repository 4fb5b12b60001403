use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub task_name: String,
    pub field: String,
    pub is_done: bool,
}

/// One sensor reading for a field, as recorded by the analytics pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub field_name: String,
    pub crop_type: String,
    pub season: String,
    pub soil_temp: f64,
    pub soil_moisture: f64,
    pub growth_stage: String,
    pub sunlight: f64,
    pub canopy_cover: f64,
    pub recorded_at: String,
}

/// The farm context the assistant answers from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmRecords {
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default, rename = "analyticsData")]
    pub analytics_data: Vec<AnalyticsRecord>,
}

impl FarmRecords {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_analytics() -> Vec<AnalyticsRecord> {
    vec![AnalyticsRecord {
        field_name: "North Field".to_string(),
        crop_type: "Maize".to_string(),
        season: "Kharif".to_string(),
        soil_temp: 24.5,
        soil_moisture: 31.0,
        growth_stage: "Vegetative".to_string(),
        sunlight: 7.5,
        canopy_cover: 0.62,
        recorded_at: "2024-07-01T08:00:00Z".to_string(),
    }]
}

#[cfg(test)]
pub(crate) fn sample_tasks() -> Vec<TaskRecord> {
    vec![
        TaskRecord {
            id: 1,
            task_name: "Irrigate".to_string(),
            field: "North Field".to_string(),
            is_done: false,
        },
        TaskRecord {
            id: 2,
            task_name: "Apply fertiliser".to_string(),
            field: "South Field".to_string(),
            is_done: true,
        },
    ]
}
