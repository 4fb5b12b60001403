pub mod http;

pub use http::HttpClassifier;

use crate::error::ClassifierFailure;
use crate::scan::image::CapturedImage;
use crate::scan::outcome::{ClassificationOutcome, ClassifierPayload, ClassifierSlot};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::task::{Context, Poll};
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::error::Elapsed;
use tower::timeout::{Timeout, TimeoutLayer};
use tower::{BoxError, Service, ServiceBuilder, ServiceExt};
use tracing::debug;

/// A remote service that looks at a plant photo and says something about it.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<ClassifierPayload, ClassifierFailure>;
    fn name(&self) -> &str;
}

/// One attempt's worth of input for a classifier. Built fresh per call.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    image: CapturedImage,
    file_name: String,
}

impl ClassificationRequest {
    pub fn new(image: CapturedImage, image_key: &str) -> Self {
        let file_name = format!("{}.{}", image_key, image.extension());
        Self { image, file_name }
    }

    pub fn image(&self) -> &CapturedImage {
        &self.image
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Adapts a [`Classifier`] to a tower service so it can be layered.
#[derive(Clone)]
pub struct ClassifierService {
    inner: Arc<dyn Classifier>,
}

impl ClassifierService {
    pub fn new(inner: Arc<dyn Classifier>) -> Self {
        Self { inner }
    }
}

impl Service<ClassificationRequest> for ClassifierService {
    type Response = ClassifierPayload;
    type Error = ClassifierFailure;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ClassificationRequest) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { inner.classify(request).await })
    }
}

/// A classifier bound to its slot, with every call bounded by a timeout.
#[derive(Clone)]
pub struct ClassifierHandle {
    slot: ClassifierSlot,
    name: String,
    service: Timeout<ClassifierService>,
    timeout: Duration,
}

impl ClassifierHandle {
    pub fn new(slot: ClassifierSlot, classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        let name = classifier.name().to_string();
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .service(ClassifierService::new(classifier));
        Self {
            slot,
            name,
            service,
            timeout,
        }
    }

    pub fn slot(&self) -> ClassifierSlot {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs one attempt. Every failure mode comes back as data.
    pub async fn call(&self, image: &CapturedImage, image_key: &str) -> ClassificationOutcome {
        let request = ClassificationRequest::new(image.clone(), image_key);
        let result = self
            .service
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| self.failure_from(e));
        debug!(
            "{} classifier ({}) settled: success={}",
            self.slot.as_str(),
            self.name,
            result.is_ok()
        );
        ClassificationOutcome::from(result)
    }

    fn failure_from(&self, error: BoxError) -> ClassifierFailure {
        if error.is::<Elapsed>() {
            return ClassifierFailure::Timeout(self.timeout);
        }
        match error.downcast::<ClassifierFailure>() {
            Ok(failure) => *failure,
            Err(other) => ClassifierFailure::Transport(other.to_string()),
        }
    }
}
