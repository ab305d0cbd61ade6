//! In-memory transport used by the integration tests.
//!
//! Every request is recorded (with its body drained) and answered by the
//! next scripted responder. Tests then assert on what went over the wire.

#![allow(dead_code)]

use bytes::Bytes;
use futures::StreamExt;
use object_transfer::{
    ClientConfig, StorageClient, StorageResult,
    transport::{RequestBody, Transport, TransportRequest, TransportResponse},
};
use reqwest::{
    Method, StatusCode,
    header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, HeaderValue},
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub cdn: bool,
}

impl Recorded {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Responder = Box<dyn Fn(&Recorded) -> TransportResponse + Send + Sync>;

#[derive(Default)]
pub struct StubTransport {
    script: Mutex<VecDeque<Responder>>,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a responder for the next unanswered request.
    pub fn then(self, responder: impl Fn(&Recorded) -> TransportResponse + Send + Sync + 'static) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Box::new(responder));
        self
    }

    pub fn then_status(self, status: StatusCode) -> Self {
        self.then(move |_| status_only(status))
    }

    /// Answer a PUT with 201 and the MD5 of the received body as `ETag`.
    pub fn then_created(self) -> Self {
        self.then(created_with_md5)
    }

    pub fn then_json(self, body: &'static str) -> Self {
        self.then(move |_| json(body))
    }

    /// Shared view of the recorded requests, usable after the stub moved
    /// into a client.
    pub fn log(&self) -> Arc<Mutex<Vec<Recorded>>> {
        self.seen.clone()
    }
}

impl Transport for StubTransport {
    async fn request(&self, request: TransportRequest) -> StorageResult<TransportResponse> {
        let TransportRequest {
            method,
            path,
            query,
            headers,
            body,
            cdn,
        } = request;

        let mut bytes = Vec::new();
        if let RequestBody::Stream { mut body, .. } = body {
            while let Some(block) = body.next().await {
                bytes.extend_from_slice(&block?);
            }
        }

        let recorded = Recorded {
            method,
            path,
            query,
            headers,
            body: bytes,
            cdn,
        };
        let responder = self.script.lock().unwrap().pop_front();
        let response = match responder {
            Some(responder) => responder(&recorded),
            None => panic!(
                "no scripted response for {} {}",
                recorded.method, recorded.path
            ),
        };
        self.seen.lock().unwrap().push(recorded);
        Ok(response)
    }
}

pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

pub fn status_only(status: StatusCode) -> TransportResponse {
    TransportResponse::from_bytes(status, HeaderMap::new(), Bytes::new())
}

pub fn created_with_md5(req: &Recorded) -> TransportResponse {
    created_with_etag(&md5_hex(&req.body))
}

pub fn created_with_etag(etag: &str) -> TransportResponse {
    let mut headers = HeaderMap::new();
    headers.insert(ETAG, HeaderValue::from_str(etag).unwrap());
    TransportResponse::from_bytes(StatusCode::CREATED, headers, Bytes::new())
}

pub fn json(body: &'static str) -> TransportResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    TransportResponse::from_bytes(StatusCode::OK, headers, body)
}

/// 200 with a body and an explicit `Content-Length`, which may lie.
pub fn body_with_length(body: &'static [u8], content_length: u64) -> TransportResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
    TransportResponse::from_bytes(StatusCode::OK, headers, body)
}

pub fn config(chunk_size: u64) -> ClientConfig {
    ClientConfig {
        chunk_size,
        block_size: 4,
        ..ClientConfig::default()
    }
}

pub fn client(stub: StubTransport, chunk_size: u64) -> (StorageClient<StubTransport>, Arc<Mutex<Vec<Recorded>>>) {
    let log = stub.log();
    (StorageClient::with_transport(stub, config(chunk_size)), log)
}

pub fn requests(log: &Arc<Mutex<Vec<Recorded>>>) -> Vec<Recorded> {
    log.lock().unwrap().clone()
}
