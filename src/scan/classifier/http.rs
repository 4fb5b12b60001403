use super::{ClassificationRequest, Classifier};
use crate::error::ClassifierFailure;
use crate::scan::outcome::ClassifierPayload;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

pub const DEFAULT_UPLOAD_FIELD: &str = "file";

/// Posts the image as a multipart upload and reads back a JSON body.
pub struct HttpClassifier {
    name: String,
    url: String,
    field_name: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_client(name, url, reqwest::Client::new())
    }

    pub fn with_client(
        name: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            field_name: DEFAULT_UPLOAD_FIELD.to_string(),
            client,
        }
    }

    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn form(&self, request: &ClassificationRequest) -> Result<Form, ClassifierFailure> {
        let image = request.image();
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(request.file_name().to_string())
            .mime_str(image.mime_type())
            .map_err(|e| ClassifierFailure::Transport(e.to_string()))?;
        Ok(Form::new().part(self.field_name.clone(), part))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<ClassifierPayload, ClassifierFailure> {
        let form = self.form(&request)?;
        debug!(
            "POST {} ({} bytes as {})",
            self.url,
            request.image().len(),
            request.file_name()
        );

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClassifierFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} classifier responded with {}", self.name, status);
            return Err(ClassifierFailure::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClassifierFailure::Transport(e.to_string()))?;
        ClassifierPayload::parse(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
