use crate::error::ClassifierFailure;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Identifies which of the two remote classifiers produced (or failed) a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassifierSlot {
    /// Classifier A: plant disease prediction.
    Plant,
    /// Classifier B: thermal analysis.
    Thermal,
}

impl ClassifierSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierSlot::Plant => "plant",
            ClassifierSlot::Thermal => "thermal",
        }
    }
}

/// A classifier response body, tagged by shape when it is parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClassifierPayload {
    Structured(IndexMap<String, Value>),
    Scalar(Value),
}

impl ClassifierPayload {
    pub fn parse(body: &[u8]) -> Result<Self, ClassifierFailure> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ClassifierFailure::Parse(e.to_string()))?;
        Ok(Self::from(value))
    }
}

impl From<Value> for ClassifierPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => ClassifierPayload::Structured(map.into_iter().collect()),
            other => ClassifierPayload::Scalar(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Success(ClassifierPayload),
    Failure(ClassifierFailure),
}

impl From<Result<ClassifierPayload, ClassifierFailure>> for ClassificationOutcome {
    fn from(result: Result<ClassifierPayload, ClassifierFailure>) -> Self {
        match result {
            Ok(payload) => ClassificationOutcome::Success(payload),
            Err(failure) => ClassificationOutcome::Failure(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisKind {
    PlantOnly,
    ThermalOnly,
    Both,
    /// Neither classifier answered. Only seen while reconciling; it is turned
    /// into a fallback attempt or `AnalysisUnavailable`, never returned.
    None,
}

impl AnalysisKind {
    pub fn from_presence(plant: bool, thermal: bool) -> Self {
        match (plant, thermal) {
            (true, true) => AnalysisKind::Both,
            (true, false) => AnalysisKind::PlantOnly,
            (false, true) => AnalysisKind::ThermalOnly,
            (false, false) => AnalysisKind::None,
        }
    }
}

/// The merged answer of one scan submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    plant: Option<ClassifierPayload>,
    thermal: Option<ClassifierPayload>,
    image_key: String,
    analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Builds a result from the payloads that arrived. Returns `None` when
    /// neither classifier produced one.
    pub fn from_payloads(
        plant: Option<ClassifierPayload>,
        thermal: Option<ClassifierPayload>,
        image_key: impl Into<String>,
    ) -> Option<Self> {
        if plant.is_none() && thermal.is_none() {
            return None;
        }
        Some(Self {
            plant,
            thermal,
            image_key: image_key.into(),
            analyzed_at: Utc::now(),
        })
    }

    pub fn single(slot: ClassifierSlot, payload: ClassifierPayload, image_key: impl Into<String>) -> Self {
        let (plant, thermal) = match slot {
            ClassifierSlot::Plant => (Some(payload), None),
            ClassifierSlot::Thermal => (None, Some(payload)),
        };
        Self {
            plant,
            thermal,
            image_key: image_key.into(),
            analyzed_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        AnalysisKind::from_presence(self.plant.is_some(), self.thermal.is_some())
    }

    pub fn plant(&self) -> Option<&ClassifierPayload> {
        self.plant.as_ref()
    }

    pub fn thermal(&self) -> Option<&ClassifierPayload> {
        self.thermal.as_ref()
    }

    pub fn payload(&self, slot: ClassifierSlot) -> Option<&ClassifierPayload> {
        match slot {
            ClassifierSlot::Plant => self.plant(),
            ClassifierSlot::Thermal => self.thermal(),
        }
    }

    pub fn image_key(&self) -> &str {
        &self.image_key
    }

    pub fn analyzed_at(&self) -> DateTime<Utc> {
        self.analyzed_at
    }
}
