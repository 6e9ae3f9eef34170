//! Shared test fixtures: an in-memory network and an in-memory archive
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use kodegen_tools_pagecapture::capture::{CaptureSettings, CaptureType, Capturer};
use kodegen_tools_pagecapture::fetcher::{FetchError, HttpClient, HttpResponse};
use kodegen_tools_pagecapture::session::SessionKey;
use kodegen_tools_pagecapture::storage::{SaveRequest, SinkError, StorageSink, StoredFile};
use parking_lot::Mutex;

pub const PAGE_URL: &str = "http://example.com/dir/page.html";
pub const SESSION_KEY: &str = "20240101000000000";

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Canned responses keyed by URL; unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MockClient {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.lock().insert(
            url.to_string(),
            Route {
                status: 200,
                content_type: Some(content_type.to_string()),
                body: body.into(),
            },
        );
        self
    }

    pub fn route_status(self, url: &str, status: u16) -> Self {
        self.routes.lock().insert(
            url.to_string(),
            Route {
                status,
                content_type: None,
                body: Vec::new(),
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|u| *u == url).count()
    }
}

impl HttpClient for MockClient {
    fn get(&self, url: &str) -> BoxFuture<'_, Result<HttpResponse, FetchError>> {
        self.requests.lock().push(url.to_string());
        let route = self.routes.lock().get(url).cloned().unwrap_or(Route {
            status: 404,
            content_type: None,
            body: Vec::new(),
        });
        let final_url = url.to_string();
        async move {
            Ok(HttpResponse {
                status: route.status,
                final_url,
                content_type: route.content_type,
                content_disposition: None,
                body: futures::stream::once(async move { Ok(route.body) }).boxed(),
            })
        }
        .boxed()
    }
}

/// Archive kept in memory, keyed by target path
#[derive(Debug, Default)]
pub struct MemorySink {
    next_id: AtomicU64,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    history: Mutex<BTreeMap<u64, String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    pub fn bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.bytes(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Paths whose download record survived
    pub fn history(&self) -> Vec<String> {
        self.history.lock().values().cloned().collect()
    }
}

impl StorageSink for MemorySink {
    fn save(&self, request: SaveRequest) -> BoxFuture<'_, Result<StoredFile, SinkError>> {
        async move {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.files
                .lock()
                .insert(request.target_path.clone(), request.bytes);
            self.history.lock().insert(id, request.target_path.clone());
            Ok(StoredFile {
                id,
                path: PathBuf::from(request.target_path),
            })
        }
        .boxed()
    }

    fn erase_record(&self, file: &StoredFile) {
        self.history.lock().remove(&file.id);
    }
}

pub struct Fixture {
    pub client: Arc<MockClient>,
    pub sink: Arc<MemorySink>,
    pub capturer: Capturer,
}

impl Fixture {
    pub fn new(client: MockClient) -> Self {
        let client = Arc::new(client);
        let sink = Arc::new(MemorySink::new());
        let capturer = Capturer::new(client.clone(), sink.clone());
        Self {
            client,
            sink,
            capturer,
        }
    }

    /// Archive member `name` of the test session
    pub fn member(&self, name: &str) -> Option<String> {
        self.sink.text(&format!("WebScrapBook/{SESSION_KEY}/{name}"))
    }

    pub fn member_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.sink.bytes(&format!("WebScrapBook/{SESSION_KEY}/{name}"))
    }
}

pub fn key() -> SessionKey {
    SessionKey::from(SESSION_KEY)
}

pub fn main_settings() -> CaptureSettings {
    CaptureSettings::main(key(), CaptureType::Tab)
}
