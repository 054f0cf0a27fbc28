//! In-memory [`RemoteClient`] for controller tests
//!
//! Responses are either canned or held behind a oneshot gate so a test decides
//! exactly when (and in which order) each call completes.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use crate::backend::{Entity, RemoteClient};
use crate::error::FetchError;

type SearchReply = Result<Vec<Entity>, FetchError>;
type FetchReply = Result<Vec<u8>, FetchError>;

enum Reply<T> {
    Ready(T),
    Gated(oneshot::Receiver<T>),
}

pub(crate) struct ScriptedClient {
    searches: Mutex<HashMap<String, VecDeque<Reply<SearchReply>>>>,
    assets: Mutex<HashMap<String, VecDeque<Reply<FetchReply>>>>,
    search_log: Mutex<Vec<String>>,
    fetch_log: Mutex<Vec<String>>,
    calls: watch::Sender<usize>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self {
            searches: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            search_log: Mutex::new(Vec::new()),
            fetch_log: Mutex::new(Vec::new()),
            calls: watch::channel(0).0,
        }
    }

    pub(crate) fn reply_search(&self, query: &str, reply: SearchReply) {
        self.searches
            .lock()
            .entry(query.to_string())
            .or_default()
            .push_back(Reply::Ready(reply));
    }

    pub(crate) fn gate_search(&self, query: &str) -> oneshot::Sender<SearchReply> {
        let (tx, rx) = oneshot::channel();
        self.searches
            .lock()
            .entry(query.to_string())
            .or_default()
            .push_back(Reply::Gated(rx));
        tx
    }

    pub(crate) fn reply_asset(&self, uri: &str, reply: FetchReply) {
        self.assets
            .lock()
            .entry(uri.to_string())
            .or_default()
            .push_back(Reply::Ready(reply));
    }

    pub(crate) fn gate_asset(&self, uri: &str) -> oneshot::Sender<FetchReply> {
        let (tx, rx) = oneshot::channel();
        self.assets
            .lock()
            .entry(uri.to_string())
            .or_default()
            .push_back(Reply::Gated(rx));
        tx
    }

    pub(crate) fn search_calls(&self) -> Vec<String> {
        self.search_log.lock().clone()
    }

    pub(crate) fn fetch_calls(&self, uri: &str) -> usize {
        self.fetch_log.lock().iter().filter(|u| *u == uri).count()
    }

    pub(crate) fn total_fetches(&self) -> usize {
        self.fetch_log.lock().len()
    }

    /// Resolves once at least `n` remote calls of either kind have started.
    pub(crate) async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn record(&self) {
        self.calls.send_modify(|count| *count += 1);
    }
}

async fn resolve<T>(reply: Option<Reply<Result<T, FetchError>>>, fallback: Result<T, FetchError>) -> Result<T, FetchError> {
    match reply {
        Some(Reply::Ready(value)) => value,
        Some(Reply::Gated(rx)) => rx
            .await
            .unwrap_or_else(|_| Err(FetchError::Network("gate dropped".into()))),
        None => fallback,
    }
}

#[async_trait]
impl RemoteClient for ScriptedClient {
    async fn search_entities(&self, query: &str) -> Result<Vec<Entity>, FetchError> {
        self.search_log.lock().push(query.to_string());
        let reply = self.searches.lock().get_mut(query).and_then(VecDeque::pop_front);
        self.record();
        resolve(reply, Ok(Vec::new())).await
    }

    async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_log.lock().push(uri.to_string());
        let reply = self.assets.lock().get_mut(uri).and_then(VecDeque::pop_front);
        self.record();
        resolve(reply, Err(FetchError::HttpStatus(404))).await
    }
}

/// A small valid PNG.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 120, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
