//! Test doubles shared by the unit tests.

use crate::error::{ClassifierFailure, FlowError, MediaError};
use crate::flows::{ConversationalFlow, FarmAssistantInput, FarmAssistantOutput};
use crate::media::{MediaSource, StreamHandle};
use crate::scan::classifier::{ClassificationRequest, Classifier};
use crate::scan::image::CapturedImage;
use crate::scan::outcome::ClassifierPayload;
use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub enum Script {
    Respond(Result<ClassifierPayload, ClassifierFailure>),
    /// Never answers within any reasonable timeout.
    Hang,
}

impl Script {
    pub fn ok(value: Value) -> Self {
        Script::Respond(Ok(ClassifierPayload::from(value)))
    }

    pub fn fail(failure: ClassifierFailure) -> Self {
        Script::Respond(Err(failure))
    }
}

/// Plays back one scripted answer per call and records what it was asked.
pub struct ScriptedClassifier {
    name: String,
    script: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn new(name: &str, script: Vec<Script>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        request: ClassificationRequest,
    ) -> Result<ClassifierPayload, ClassifierFailure> {
        self.requests
            .lock()
            .unwrap()
            .push(request.file_name().to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Script::Respond(result)) => result,
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ClassifierFailure::Transport("hung".to_string()))
            }
            None => Err(ClassifierFailure::Transport(format!(
                "{} script exhausted",
                self.name
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Answers chat questions from a fixed list and keeps the inputs it saw.
pub struct ScriptedFlow {
    answers: Mutex<VecDeque<Result<String, FlowError>>>,
    questions: Mutex<Vec<FarmAssistantInput>>,
}

impl ScriptedFlow {
    pub fn new(answers: Vec<Result<String, FlowError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<FarmAssistantInput> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationalFlow for ScriptedFlow {
    async fn answer(&self, input: FarmAssistantInput) -> Result<FarmAssistantOutput, FlowError> {
        self.questions.lock().unwrap().push(input);
        let next = self.answers.lock().unwrap().pop_front();
        match next {
            Some(answer) => answer.map(|answer| FarmAssistantOutput { answer }),
            None => Err(FlowError::MalformedResponse("script exhausted".to_string())),
        }
    }
}

#[derive(Clone, Default)]
pub struct CameraCounters {
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl CameraCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A camera that always yields a small solid-colour frame.
pub struct FakeCamera {
    denied: bool,
    counters: CameraCounters,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            denied: false,
            counters: CameraCounters::default(),
        }
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::new()
        }
    }

    pub fn counters(&self) -> CameraCounters {
        self.counters.clone()
    }
}

#[async_trait]
impl MediaSource for FakeCamera {
    async fn open(&mut self) -> Result<StreamHandle, MediaError> {
        if self.denied {
            return Err(MediaError::PermissionDenied("camera blocked".to_string()));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(StreamHandle::new())
    }

    async fn capture_frame(&mut self, _stream: &StreamHandle) -> Result<CapturedImage, MediaError> {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([40, 160, 60])));
        CapturedImage::from_frame(&frame)
    }

    fn close(&mut self, _stream: StreamHandle) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Accepts a single HTTP request on an ephemeral port and answers it with the
/// given status line and body. The join handle yields the raw request text.
pub async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{}/", addr), handle)
}

/// A URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/", addr)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(header_end) = find_header_end(&buffer) {
            let headers = String::from_utf8_lossy(&buffer[..header_end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    buffer
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}
