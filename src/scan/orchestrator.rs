use crate::config::Configuration;
use crate::error::{AppError, AttemptPhase, ClassifierFailure, FailedAttempt, ScanError};
use crate::scan::classifier::{Classifier, ClassifierHandle, HttpClassifier};
use crate::scan::image::CapturedImage;
use crate::scan::outcome::{AnalysisResult, ClassificationOutcome, ClassifierPayload, ClassifierSlot};
use crate::storage::{FsImageStore, ImageStore, MemoryImageStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(20);

/// Decides whether a failed plant retry moves on to the thermal classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Any failure of the plant retry moves on to the thermal retry.
    #[default]
    AnyFailure,
    /// Only connection errors and timeouts move on; an HTTP error or an
    /// unparsable body from the plant retry ends the submission.
    TransportOnly,
}

impl FallbackPolicy {
    pub fn allows_alternate(&self, failure: &ClassifierFailure) -> bool {
        match self {
            FallbackPolicy::AnyFailure => true,
            FallbackPolicy::TransportOnly => failure.is_transport(),
        }
    }
}

/// Sends a scan to both classifiers, reconciles what comes back and retries
/// sequentially when neither answered.
#[derive(Clone)]
pub struct ScanOrchestrator {
    plant: ClassifierHandle,
    thermal: ClassifierHandle,
    store: Arc<dyn ImageStore>,
    fallback_policy: FallbackPolicy,
}

impl ScanOrchestrator {
    pub fn builder() -> ScanOrchestratorBuilder {
        ScanOrchestratorBuilder::new()
    }

    /// Wires HTTP classifiers and the on-disk image cache from configuration.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, AppError> {
        configuration
            .validate()
            .map_err(AppError::InvalidConfiguration)?;
        let settings = &configuration.classifiers;
        let client = reqwest::Client::new();
        let plant = HttpClassifier::with_client("plant", settings.plant_url.clone(), client.clone())
            .with_field_name(settings.upload_field.clone());
        let thermal = HttpClassifier::with_client("thermal", settings.thermal_url.clone(), client)
            .with_field_name(settings.upload_field.clone());

        Self::builder()
            .plant_classifier(Arc::new(plant))
            .thermal_classifier(Arc::new(thermal))
            .store(Arc::new(FsImageStore::new(configuration.storage.image_dir.clone())))
            .timeout(settings.timeout())
            .fallback_policy(settings.fallback)
            .build()
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        self.fallback_policy
    }

    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub async fn submit_for_analysis(
        &self,
        image: &CapturedImage,
    ) -> Result<AnalysisResult, ScanError> {
        image.validate()?;

        let image_key = format!("scan_{}", Uuid::new_v4());
        let started = Instant::now();
        debug!("Dispatching {} to both classifiers", image_key);

        let (_, plant, thermal) = tokio::join!(
            self.persist(&image_key, image),
            self.plant.call(image, &image_key),
            self.thermal.call(image, &image_key),
        );

        let mut attempts = Vec::new();
        let plant = settle(plant, ClassifierSlot::Plant, AttemptPhase::Parallel, &mut attempts);
        let thermal = settle(thermal, ClassifierSlot::Thermal, AttemptPhase::Parallel, &mut attempts);

        match AnalysisResult::from_payloads(plant, thermal, image_key.clone()) {
            Some(result) => {
                info!(
                    "Scan {} analysed as {:?} in {}ms",
                    image_key,
                    result.kind(),
                    started.elapsed().as_millis()
                );
                Ok(result)
            }
            None => {
                warn!("Both classifiers failed for {}, retrying sequentially", image_key);
                let outcome = self.fallback(image, &image_key, attempts).await;
                match &outcome {
                    Ok(result) => info!(
                        "Scan {} recovered as {:?} in {}ms",
                        image_key,
                        result.kind(),
                        started.elapsed().as_millis()
                    ),
                    Err(e) => warn!("Scan {} failed: {}", image_key, e),
                }
                outcome
            }
        }
    }

    async fn fallback(
        &self,
        image: &CapturedImage,
        image_key: &str,
        mut attempts: Vec<FailedAttempt>,
    ) -> Result<AnalysisResult, ScanError> {
        let failure = match self.plant.call(image, image_key).await {
            ClassificationOutcome::Success(payload) => {
                return Ok(AnalysisResult::single(ClassifierSlot::Plant, payload, image_key));
            }
            ClassificationOutcome::Failure(failure) => failure,
        };

        let try_thermal = self.fallback_policy.allows_alternate(&failure);
        attempts.push(FailedAttempt {
            slot: ClassifierSlot::Plant,
            phase: AttemptPhase::Fallback,
            failure,
        });
        if !try_thermal {
            debug!("Fallback policy {:?} stops after the plant retry", self.fallback_policy);
            return Err(ScanError::AnalysisUnavailable { attempts });
        }

        match self.thermal.call(image, image_key).await {
            ClassificationOutcome::Success(payload) => {
                Ok(AnalysisResult::single(ClassifierSlot::Thermal, payload, image_key))
            }
            ClassificationOutcome::Failure(failure) => {
                attempts.push(FailedAttempt {
                    slot: ClassifierSlot::Thermal,
                    phase: AttemptPhase::Fallback,
                    failure,
                });
                Err(ScanError::AnalysisUnavailable { attempts })
            }
        }
    }

    /// Best effort; a failed write never affects the analysis.
    async fn persist(&self, image_key: &str, image: &CapturedImage) {
        match self.store.put(image_key, image).await {
            Ok(()) => debug!("Cached scan image as {}", image_key),
            Err(e) => warn!("Could not cache scan image {}: {}", image_key, e),
        }
    }
}

fn settle(
    outcome: ClassificationOutcome,
    slot: ClassifierSlot,
    phase: AttemptPhase,
    attempts: &mut Vec<FailedAttempt>,
) -> Option<ClassifierPayload> {
    match outcome {
        ClassificationOutcome::Success(payload) => Some(payload),
        ClassificationOutcome::Failure(failure) => {
            warn!("{} classifier failed: {}", slot.as_str(), failure);
            attempts.push(FailedAttempt {
                slot,
                phase,
                failure,
            });
            None
        }
    }
}

pub struct ScanOrchestratorBuilder {
    plant: Option<Arc<dyn Classifier>>,
    thermal: Option<Arc<dyn Classifier>>,
    store: Option<Arc<dyn ImageStore>>,
    timeout: Duration,
    fallback_policy: FallbackPolicy,
}

impl ScanOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            plant: None,
            thermal: None,
            store: None,
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
            fallback_policy: FallbackPolicy::default(),
        }
    }

    pub fn plant_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.plant = Some(classifier);
        self
    }

    pub fn thermal_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.thermal = Some(classifier);
        self
    }

    // Without a store, images are cached in memory for the life of the process.
    pub fn store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }

    pub fn build(self) -> Result<ScanOrchestrator, AppError> {
        if self.timeout.is_zero() {
            return Err(AppError::InvalidConfiguration(
                "Classifier timeout must be greater than 0".to_string(),
            ));
        }
        let plant = self
            .plant
            .ok_or(AppError::InvalidConfiguration("Plant classifier not set".to_string()))?;
        let thermal = self
            .thermal
            .ok_or(AppError::InvalidConfiguration("Thermal classifier not set".to_string()))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryImageStore::new()));

        Ok(ScanOrchestrator {
            plant: ClassifierHandle::new(ClassifierSlot::Plant, plant, self.timeout),
            thermal: ClassifierHandle::new(ClassifierSlot::Thermal, thermal, self.timeout),
            store,
            fallback_policy: self.fallback_policy,
        })
    }
}

impl Default for ScanOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::scan::image::sample_jpeg;
    use crate::scan::outcome::AnalysisKind;
    use crate::scan::render::render_result;
    use crate::testing::{Script, ScriptedClassifier};
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixture {
        plant: Arc<ScriptedClassifier>,
        thermal: Arc<ScriptedClassifier>,
        store: Arc<MemoryImageStore>,
        orchestrator: ScanOrchestrator,
    }

    fn fixture(plant: Vec<Script>, thermal: Vec<Script>) -> Fixture {
        fixture_with(plant, thermal, FallbackPolicy::AnyFailure, Duration::from_secs(5))
    }

    fn fixture_with(
        plant: Vec<Script>,
        thermal: Vec<Script>,
        policy: FallbackPolicy,
        timeout: Duration,
    ) -> Fixture {
        let plant = Arc::new(ScriptedClassifier::new("plant", plant));
        let thermal = Arc::new(ScriptedClassifier::new("thermal", thermal));
        let store = Arc::new(MemoryImageStore::new());
        let orchestrator = ScanOrchestrator::builder()
            .plant_classifier(plant.clone())
            .thermal_classifier(thermal.clone())
            .store(store.clone())
            .timeout(timeout)
            .fallback_policy(policy)
            .build()
            .unwrap();
        Fixture {
            plant,
            thermal,
            store,
            orchestrator,
        }
    }

    fn down() -> Script {
        Script::fail(ClassifierFailure::Transport("connection refused".to_string()))
    }

    #[tokio::test]
    async fn both_classifiers_succeeding_gives_both() {
        let f = fixture(
            vec![Script::ok(json!({"disease": "blight", "confidence": 0.87}))],
            vec![Script::ok(json!({"leaf_temp": 28.5, "stress_index": 3}))],
        );

        let result = f.orchestrator.submit_for_analysis(&sample_jpeg()).await.unwrap();

        assert_eq!(result.kind(), AnalysisKind::Both);
        let rendered = render_result(&result);
        assert_eq!(rendered.rows().count(), 4);
        for label in ["Disease", "Confidence", "Leaf Temp", "Stress Index"] {
            assert!(rendered.row(label).is_some(), "missing row {}", label);
        }
        assert_eq!(f.store.keys(), vec![result.image_key().to_string()]);
    }

    #[tokio::test]
    async fn one_success_skips_the_fallback() {
        let f = fixture(
            vec![Script::fail(ClassifierFailure::Status(502))],
            vec![Script::ok(json!({"max_temp": 34}))],
        );

        let result = f.orchestrator.submit_for_analysis(&sample_jpeg()).await.unwrap();

        assert_eq!(result.kind(), AnalysisKind::ThermalOnly);
        assert_eq!(f.plant.calls(), 1);
        assert_eq!(f.thermal.calls(), 1);
    }

    #[tokio::test]
    async fn plant_retry_success_is_attributed_to_plant() {
        let f = fixture(
            vec![down(), Script::ok(json!({"disease": "healthy"}))],
            vec![Script::fail(ClassifierFailure::Parse("eof".to_string()))],
        );

        let result = f.orchestrator.submit_for_analysis(&sample_jpeg()).await.unwrap();

        assert_eq!(result.kind(), AnalysisKind::PlantOnly);
        assert_eq!(f.plant.calls(), 2);
        assert_eq!(f.thermal.calls(), 1, "thermal must not be retried");
    }

    #[tokio::test]
    async fn failed_plant_retry_falls_back_to_thermal() {
        let f = fixture(
            vec![down(), down()],
            vec![down(), Script::ok(json!("no hotspots"))],
        );

        let result = f.orchestrator.submit_for_analysis(&sample_jpeg()).await.unwrap();

        assert_eq!(result.kind(), AnalysisKind::ThermalOnly);
        assert_eq!(f.plant.calls(), 2);
        assert_eq!(f.thermal.calls(), 2);
    }

    #[tokio::test]
    async fn everything_failing_is_analysis_unavailable() {
        let f = fixture(vec![down(), down()], vec![down(), down()]);

        let error = f
            .orchestrator
            .submit_for_analysis(&sample_jpeg())
            .await
            .unwrap_err();

        match error {
            ScanError::AnalysisUnavailable { attempts } => {
                assert_eq!(attempts.len(), 4);
                assert_eq!(attempts[2].slot, ClassifierSlot::Plant);
                assert_eq!(attempts[2].phase, AttemptPhase::Fallback);
                assert_eq!(attempts[3].slot, ClassifierSlot::Thermal);
            }
            other => panic!("expected AnalysisUnavailable, got {:?}", other),
        }
        assert_eq!(f.store.len(), 1, "the image is cached even when analysis fails");
    }

    #[tokio::test]
    async fn transport_only_policy_stops_on_http_errors() {
        let f = fixture_with(
            vec![down(), Script::fail(ClassifierFailure::Status(500))],
            vec![down(), Script::ok(json!({"max_temp": 30}))],
            FallbackPolicy::TransportOnly,
            Duration::from_secs(5),
        );

        let error = f
            .orchestrator
            .submit_for_analysis(&sample_jpeg())
            .await
            .unwrap_err();

        assert!(matches!(error, ScanError::AnalysisUnavailable { ref attempts } if attempts.len() == 3));
        assert_eq!(f.thermal.calls(), 1);
    }

    #[tokio::test]
    async fn transport_only_policy_moves_on_after_connection_errors() {
        let f = fixture_with(
            vec![down(), down()],
            vec![down(), Script::ok(json!({"max_temp": 30}))],
            FallbackPolicy::TransportOnly,
            Duration::from_secs(5),
        );

        let result = f.orchestrator.submit_for_analysis(&sample_jpeg()).await.unwrap();
        assert_eq!(result.kind(), AnalysisKind::ThermalOnly);
    }

    #[tokio::test]
    async fn invalid_input_fails_before_any_call() {
        let f = fixture(vec![], vec![]);

        let error = f
            .orchestrator
            .submit_for_analysis(&CapturedImage::from_bytes(Vec::new()))
            .await
            .unwrap_err();

        assert!(matches!(error, ScanError::InvalidInput(_)));
        assert_eq!(f.plant.calls(), 0);
        assert_eq!(f.thermal.calls(), 0);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn plant_result_survives_a_thermal_timeout() {
        let f = fixture_with(
            vec![Script::ok(json!({"disease": "blight", "confidence": 0.87}))],
            vec![Script::Hang],
            FallbackPolicy::AnyFailure,
            Duration::from_millis(100),
        );

        let result = f.orchestrator.submit_for_analysis(&sample_jpeg()).await.unwrap();

        assert_eq!(result.kind(), AnalysisKind::PlantOnly);
        let rendered = render_result(&result);
        assert_eq!(rendered.row("Disease").unwrap().to_string(), "Disease: blight");
        assert_eq!(rendered.row("Confidence").unwrap().to_string(), "Confidence: 0.87");
        assert_eq!(f.store.len(), 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl ImageStore for BrokenStore {
        async fn put(&self, _key: &str, _image: &CapturedImage) -> Result<(), PersistenceError> {
            Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    #[tokio::test]
    async fn persistence_failure_does_not_block_analysis() {
        let orchestrator = ScanOrchestrator::builder()
            .plant_classifier(Arc::new(ScriptedClassifier::new(
                "plant",
                vec![Script::ok(json!({"disease": "none"}))],
            )))
            .thermal_classifier(Arc::new(ScriptedClassifier::new("thermal", vec![down()])))
            .store(Arc::new(BrokenStore))
            .build()
            .unwrap();

        let result = orchestrator.submit_for_analysis(&sample_jpeg()).await.unwrap();
        assert_eq!(result.kind(), AnalysisKind::PlantOnly);
    }

    #[test]
    fn builder_requires_both_classifiers() {
        let result = ScanOrchestrator::builder()
            .plant_classifier(Arc::new(ScriptedClassifier::new("plant", vec![])))
            .build();
        assert!(matches!(result, Err(AppError::InvalidConfiguration(_))));
    }

    #[test]
    fn fallback_policy_parses_from_snake_case() {
        let policy: FallbackPolicy = serde_json::from_str("\"transport_only\"").unwrap();
        assert_eq!(policy, FallbackPolicy::TransportOnly);
    }
}
