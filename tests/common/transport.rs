//! Stub HTTP transport.

use async_trait::async_trait;
use bytes::Bytes;
use demibot::error::FetchError;
use demibot::fetch::{FetchRequest, HttpBody, HttpTransport};
use http::header::{CONTENT_LENGTH, HeaderValue};
use http::HeaderMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers every request with the same canned response.
#[derive(Clone)]
pub struct StubTransport {
    status: u16,
    headers: HeaderMap,
    chunks: Vec<Bytes>,
    stall: bool,
    chunk_reads: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

#[allow(dead_code)]
impl StubTransport {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            chunks: vec![Bytes::copy_from_slice(body.as_bytes())],
            stall: false,
            chunk_reads: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new(200, body)
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.headers
            .insert(CONTENT_LENGTH, HeaderValue::from(length));
        self
    }

    /// Replace the body with `count` chunks of `size` bytes each.
    pub fn with_chunks(mut self, count: usize, size: usize) -> Self {
        self.chunks = (0..count).map(|_| Bytes::from(vec![b'x'; size])).collect();
        self
    }

    /// Replace the body with raw bytes.
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.chunks = vec![Bytes::copy_from_slice(body)];
        self
    }

    /// Never answer.
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    /// Number of body chunk reads across all responses.
    pub fn chunk_reads(&self) -> usize {
        self.chunk_reads.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn get(&self, request: FetchRequest) -> Result<Box<dyn HttpBody>, FetchError> {
        self.requests.lock().push(request);
        if self.stall {
            std::future::pending::<()>().await;
        }
        Ok(Box::new(StubBody {
            status: self.status,
            headers: self.headers.clone(),
            chunks: self.chunks.iter().cloned().collect(),
            reads: Arc::clone(&self.chunk_reads),
        }))
    }
}

struct StubBody {
    status: u16,
    headers: HeaderMap,
    chunks: VecDeque<Bytes>,
    reads: Arc<AtomicUsize>,
}

#[async_trait]
impl HttpBody for StubBody {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.chunks.pop_front())
    }
}
