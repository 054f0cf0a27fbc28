//! Search query controller
//!
//! Owns the current query text and result list. Every call to
//! [`QueryController::search`] advances an epoch; a completion only lands if
//! its epoch is still current, so a slow response to an older query can never
//! overwrite the results of a newer one. The transport itself is not cancelled.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::backend::{Entity, RemoteClient};
use crate::error::FetchError;
use crate::inflight::InFlight;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Published search state
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub query: String,
    /// Hits in the order the API ranked them
    pub results: Vec<Entity>,
    pub phase: Phase,
    pub loading: bool,
    pub last_error: Option<FetchError>,
    /// Epoch of the most recent `search` call
    pub epoch: u64,
}

pub struct QueryController {
    client: Arc<dyn RemoteClient>,
    state: Arc<watch::Sender<QueryState>>,
    tasks: Mutex<JoinSet<()>>,
    in_flight: InFlight,
}

impl QueryController {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            client,
            state: Arc::new(state),
            tasks: Mutex::new(JoinSet::new()),
            in_flight: InFlight::new(),
        }
    }

    /// Receive every published state change.
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    /// Start a search for `query` and return its epoch.
    ///
    /// An empty query clears the results immediately without a network call.
    /// Must be called from within a Tokio runtime.
    pub fn search(&self, query: impl Into<String>) -> u64 {
        let query = query.into();
        let dispatch = !query.is_empty();
        let mut epoch = 0;

        self.state.send_modify(|state| {
            state.epoch += 1;
            epoch = state.epoch;
            state.query = query.clone();
            state.last_error = None;
            if dispatch {
                state.phase = Phase::Loading;
                state.loading = true;
            } else {
                state.results.clear();
                state.phase = Phase::Loaded;
                state.loading = false;
            }
        });

        if !dispatch {
            tracing::debug!("Empty query, results cleared (epoch {})", epoch);
            return epoch;
        }

        tracing::info!("Searching for {:?} (epoch {})", query, epoch);

        let client = self.client.clone();
        let state = self.state.clone();
        let guard = self.in_flight.enter();
        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _guard = guard;
            let outcome = client.search_entities(&query).await;
            apply_outcome(&state, epoch, outcome);
        });

        epoch
    }

    /// Wait for every dispatched search to finish, superseded ones included.
    pub async fn drain(&self) {
        self.in_flight.wait_at_most(0).await;
    }

    /// Wait until no search is loading and return the settled state.
    pub async fn settled(&self) -> QueryState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|state| !state.loading).await.map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }
}

/// Apply a completion if `epoch` is still current. Returns whether it landed.
fn apply_outcome(
    state: &watch::Sender<QueryState>,
    epoch: u64,
    outcome: Result<Vec<Entity>, FetchError>,
) -> bool {
    state.send_if_modified(|state| {
        if state.epoch != epoch {
            tracing::debug!("Discarding stale search response (epoch {} < {})", epoch, state.epoch);
            return false;
        }

        match outcome {
            Ok(results) => {
                tracing::info!("Search {:?} returned {} results", state.query, results.len());
                state.results = results;
                state.phase = Phase::Loaded;
            }
            Err(err) => {
                tracing::warn!("Search {:?} failed: {}", state.query, err);
                state.results.clear();
                state.last_error = Some(err);
                state.phase = Phase::Failed;
            }
        }
        state.loading = false;
        true
    })
}
