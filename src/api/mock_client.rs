use crate::api::client::{ByteStream, MockStreamProducer};
use crate::types::GenerateRequest;
use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};

/// Replays canned response bodies. Each response is a list of raw network
/// reads, so objects can be split at any byte offset.
#[derive(Clone)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl MockApiClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn recorded_requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(&self, request: &GenerateRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!(
                "MockApiClient: No more responses configured"
            ));
        }
        let reads = responses_guard.remove(0);

        let byte_chunks: Vec<Result<Bytes, crate::api::ApiError>> =
            reads.into_iter().map(|s| Ok(Bytes::from(s))).collect();

        Ok(Box::pin(stream::iter(byte_chunks)))
    }
}
