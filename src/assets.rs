//! Lazily fetched avatar cache
//!
//! One slot per entity id. A slot goes `Pending` under the map lock before any
//! network call is issued, so concurrent requests for the same entity collapse
//! into a single fetch. Entries live for the lifetime of the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;

use crate::backend::{Entity, EntityId, RemoteClient};
use crate::error::FetchError;
use crate::inflight::InFlight;

const CHANGE_CAPACITY: usize = 256;

/// A decoded avatar together with the bytes it came from
pub struct Avatar {
    bytes: Vec<u8>,
    format: Option<ImageFormat>,
    image: DynamicImage,
}

impl Avatar {
    pub fn decode(bytes: Vec<u8>) -> Result<Self, FetchError> {
        let format = image::guess_format(&bytes).ok();
        let image = image::load_from_memory(&bytes)?;
        Ok(Self { bytes, format, image })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl fmt::Debug for Avatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Avatar")
            .field("format", &self.format)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub enum AssetSlot {
    #[default]
    Absent,
    Pending,
    Loaded(Arc<Avatar>),
    Failed(FetchError),
}

impl AssetSlot {
    pub fn is_pending(&self) -> bool {
        matches!(self, AssetSlot::Pending)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, AssetSlot::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AssetSlot::Failed(_))
    }

    pub fn avatar(&self) -> Option<&Arc<Avatar>> {
        match self {
            AssetSlot::Loaded(avatar) => Some(avatar),
            _ => None,
        }
    }

    /// Pending and loaded slots never trigger another fetch.
    fn blocks_fetch(&self) -> bool {
        matches!(self, AssetSlot::Pending | AssetSlot::Loaded(_))
    }
}

/// Published on every slot transition
#[derive(Debug, Clone)]
pub struct SlotChange {
    pub id: EntityId,
    pub slot: AssetSlot,
}

type Slots = Arc<Mutex<HashMap<EntityId, AssetSlot>>>;

pub struct AssetCache {
    client: Arc<dyn RemoteClient>,
    slots: Slots,
    changes: broadcast::Sender<SlotChange>,
    limiter: Option<Arc<Semaphore>>,
    tasks: Mutex<JoinSet<()>>,
    in_flight: InFlight,
}

impl AssetCache {
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self::with_limit(client, None)
    }

    /// Like [`AssetCache::new`], with at most `limit` downloads in flight.
    pub fn with_limit(client: Arc<dyn RemoteClient>, limit: Option<usize>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            client,
            slots: Arc::new(Mutex::new(HashMap::new())),
            changes,
            limiter: limit.map(|permits| Arc::new(Semaphore::new(permits))),
            tasks: Mutex::new(JoinSet::new()),
            in_flight: InFlight::new(),
        }
    }

    pub fn get(&self, id: EntityId) -> AssetSlot {
        self.slots.lock().get(&id).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<EntityId, AssetSlot> {
        self.slots.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SlotChange> {
        self.changes.subscribe()
    }

    /// Fetch `entity`'s avatar unless it is already loaded or in flight.
    ///
    /// Returns whether a fetch was dispatched. A failed slot is fetched again.
    /// Must be called from within a Tokio runtime.
    pub fn request(&self, entity: &Entity) -> bool {
        {
            let mut slots = self.slots.lock();
            if slots.get(&entity.id).is_some_and(AssetSlot::blocks_fetch) {
                tracing::trace!("Avatar for {} already pending or loaded", entity.id);
                return false;
            }
            transition(&mut slots, &self.changes, entity.id, AssetSlot::Pending);
        }

        tracing::debug!("Fetching avatar for {} from {}", entity.id, entity.avatar_url);

        let id = entity.id;
        let uri = entity.avatar_url.clone();
        let client = self.client.clone();
        let slots = self.slots.clone();
        let changes = self.changes.clone();
        let limiter = self.limiter.clone();
        let guard = self.in_flight.enter();

        let mut tasks = self.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let _guard = guard;
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            let slot = match fetch_avatar(client.as_ref(), &uri).await {
                Ok(avatar) => {
                    tracing::debug!("Loaded avatar for {} ({:?})", id, avatar);
                    AssetSlot::Loaded(Arc::new(avatar))
                }
                Err(err) => {
                    tracing::warn!("Avatar fetch for {} failed: {}", id, err);
                    AssetSlot::Failed(err)
                }
            };
            transition(&mut slots.lock(), &changes, id, slot);
        });

        true
    }

    /// Request every entity in `entities`; returns how many fetches were dispatched.
    pub fn request_all<'a>(&self, entities: impl IntoIterator<Item = &'a Entity>) -> usize {
        entities.into_iter().filter(|entity| self.request(entity)).count()
    }

    /// Wait for every dispatched fetch to settle.
    pub async fn drain(&self) {
        self.in_flight.wait_at_most(0).await;
    }
}

async fn fetch_avatar(client: &dyn RemoteClient, uri: &str) -> Result<Avatar, FetchError> {
    let bytes = client.fetch_bytes(uri).await?;
    tokio::task::spawn_blocking(move || Avatar::decode(bytes))
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))?
}

/// Write a slot and publish the change while the map lock is held.
fn transition(
    slots: &mut HashMap<EntityId, AssetSlot>,
    changes: &broadcast::Sender<SlotChange>,
    id: EntityId,
    slot: AssetSlot,
) {
    slots.insert(id, slot.clone());
    // No subscribers is fine.
    let _ = changes.send(SlotChange { id, slot });
}
