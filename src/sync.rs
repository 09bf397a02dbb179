/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Best-effort remote synchronization.
//!
//! After every durable history record the session pushes the current graph
//! and serialized log to the backend. The push is advisory: it runs on a
//! detached thread, failures are logged and swallowed, there is no retry and
//! no ordering guarantee between rapid pushes. Local history stays
//! authoritative for undo/redo.
//!
//! The knowledge-base client is the same boundary for the document store:
//! thin calls, with a bounded retry loop on document deletion.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;
use serde::Serialize;
use url::Url;

#[derive(Debug)]
pub enum SyncError {
    InvalidUrl(String),
    Network(String),
    HttpStatus(u16),
    Serialize(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::InvalidUrl(e) => write!(f, "Invalid URL: {e}"),
            SyncError::Network(e) => write!(f, "Network error: {e}"),
            SyncError::HttpStatus(code) => write!(f, "HTTP status {code}"),
            SyncError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

/// Body of the history push. Each field is a JSON **string** (serialized
/// separately), not nested JSON — the backend schema stores them opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPayload {
    pub nodes: String,
    pub edges: String,
    pub history: String,
}

/// Where durable history records get pushed. Implemented over HTTP in
/// production; tests substitute a recording sink.
pub trait RemoteHistorySink: Send + Sync {
    fn push_history(&self, graph_id: &str, payload: &HistoryPayload) -> Result<(), SyncError>;
}

fn shared_client() -> Result<&'static Client, SyncError> {
    static CLIENT: OnceLock<Option<Client>> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            Client::builder()
                .timeout(Duration::from_secs(4))
                .build()
                .ok()
        })
        .as_ref()
        .ok_or_else(|| SyncError::Network("HTTP client failed to initialize".to_string()))
}

/// HTTP sink: `PUT {base}/graph/{id}/history`.
pub struct HttpRemoteSink {
    base: Url,
}

impl HttpRemoteSink {
    pub fn new(base: &str) -> Result<Self, SyncError> {
        let base = Url::parse(base).map_err(|e| SyncError::InvalidUrl(format!("{e}")))?;
        Ok(Self { base })
    }

    fn endpoint(&self, graph_id: &str) -> Result<Url, SyncError> {
        self.base
            .join(&format!("graph/{graph_id}/history"))
            .map_err(|e| SyncError::InvalidUrl(format!("{e}")))
    }
}

impl RemoteHistorySink for HttpRemoteSink {
    fn push_history(&self, graph_id: &str, payload: &HistoryPayload) -> Result<(), SyncError> {
        let body =
            serde_json::to_string(payload).map_err(|e| SyncError::Serialize(format!("{e}")))?;
        let response = shared_client()?
            .put(self.endpoint(graph_id)?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| SyncError::Network(format!("{e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}

/// Fire-and-forget push on a detached thread. The caller never waits on the
/// network; failures are logged from the worker.
pub fn push_detached(
    sink: Arc<dyn RemoteHistorySink>,
    graph_id: String,
    payload: HistoryPayload,
) {
    std::thread::spawn(move || {
        if let Err(e) = sink.push_history(&graph_id, &payload) {
            warn!("Remote history push failed for graph '{graph_id}': {e}");
        }
    });
}

/// Extract the server-side graph id from a document location, e.g.
/// `https://host/graph/3/edit` or `https://host/#/graph/3`. Returns `None`
/// when the location carries no graph segment.
pub fn graph_id_from_location(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;

    if let Some(segments) = url.path_segments() {
        if let Some(id) = id_after_graph_segment(segments) {
            return Some(id);
        }
    }
    // Hash-routed locations keep the path in the fragment.
    url.fragment()
        .and_then(|fragment| id_after_graph_segment(fragment.split('/')))
}

fn id_after_graph_segment<'a>(mut segments: impl Iterator<Item = &'a str>) -> Option<String> {
    while let Some(segment) = segments.next() {
        if segment == "graph" {
            return segments
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string);
        }
    }
    None
}

/// Run `op` up to `max_attempts` times with a fixed delay between attempts.
/// An explicit loop, not recursion, so depth stays bounded and the policy is
/// inspectable.
pub fn retry_with_delay<T, E: std::fmt::Display>(
    max_attempts: usize,
    delay: Duration,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!("Attempt {attempt}/{attempts} failed, retrying: {e}");
                std::thread::sleep(delay);
                attempt += 1;
            },
            Err(e) => return Err(e),
        }
    }
}

/// Transport for the external document-store service. One method per
/// endpoint; the client adds the retry policy on top.
pub trait KnowledgeBaseTransport: Send + Sync {
    /// Create a knowledge base for a graph; returns the new base id.
    fn create_base(&self, graph_id: &str) -> Result<String, SyncError>;
    fn delete_base(&self, base_id: &str) -> Result<(), SyncError>;
    /// Upload a document into a base; returns the new document id.
    fn upload_document(&self, base_id: &str, name: &str, content: &[u8])
        -> Result<String, SyncError>;
    fn delete_document(&self, document_id: &str) -> Result<(), SyncError>;
}

const DELETE_MAX_ATTEMPTS: usize = 3;
const DELETE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Thin façade over the document-store service. Document deletion retries a
/// bounded number of times; everything else surfaces the first error.
pub struct KnowledgeBaseClient<T: KnowledgeBaseTransport> {
    transport: T,
}

impl<T: KnowledgeBaseTransport> KnowledgeBaseClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn create_base(&self, graph_id: &str) -> Result<String, SyncError> {
        self.transport.create_base(graph_id)
    }

    pub fn delete_base(&self, base_id: &str) -> Result<(), SyncError> {
        self.transport.delete_base(base_id)
    }

    pub fn upload_document(
        &self,
        base_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<String, SyncError> {
        self.transport.upload_document(base_id, name, content)
    }

    pub fn delete_document(&self, document_id: &str) -> Result<(), SyncError> {
        retry_with_delay(DELETE_MAX_ATTEMPTS, DELETE_RETRY_DELAY, || {
            self.transport.delete_document(document_id)
        })
    }
}

/// HTTP transport for the document-store service.
pub struct HttpKnowledgeBaseTransport {
    base: Url,
}

impl HttpKnowledgeBaseTransport {
    pub fn new(base: &str) -> Result<Self, SyncError> {
        let base = Url::parse(base).map_err(|e| SyncError::InvalidUrl(format!("{e}")))?;
        Ok(Self { base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.base
            .join(path)
            .map_err(|e| SyncError::InvalidUrl(format!("{e}")))
    }

    fn expect_success(response: reqwest::blocking::Response) -> Result<String, SyncError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status.as_u16()));
        }
        response.text().map_err(|e| SyncError::Network(format!("{e}")))
    }
}

impl KnowledgeBaseTransport for HttpKnowledgeBaseTransport {
    fn create_base(&self, graph_id: &str) -> Result<String, SyncError> {
        let body = serde_json::json!({ "graphId": graph_id }).to_string();
        let response = shared_client()?
            .post(self.endpoint("knowledge-base")?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| SyncError::Network(format!("{e}")))?;
        Self::expect_success(response)
    }

    fn delete_base(&self, base_id: &str) -> Result<(), SyncError> {
        let response = shared_client()?
            .delete(self.endpoint(&format!("knowledge-base/{base_id}"))?)
            .send()
            .map_err(|e| SyncError::Network(format!("{e}")))?;
        Self::expect_success(response).map(|_| ())
    }

    fn upload_document(
        &self,
        base_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<String, SyncError> {
        let mut url = self.endpoint(&format!("knowledge-base/{base_id}/document"))?;
        url.query_pairs_mut().append_pair("filename", name);
        let response = shared_client()?
            .post(url)
            .body(content.to_vec())
            .send()
            .map_err(|e| SyncError::Network(format!("{e}")))?;
        Self::expect_success(response)
    }

    fn delete_document(&self, document_id: &str) -> Result<(), SyncError> {
        let response = shared_client()?
            .delete(self.endpoint(&format!("document/{document_id}"))?)
            .send()
            .map_err(|e| SyncError::Network(format!("{e}")))?;
        Self::expect_success(response).map(|_| ())
    }
}
