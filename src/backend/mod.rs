//! Remote search API: wire types and the client seam

pub mod api;
pub mod types;

pub use api::{HttpClient, RemoteClient};
pub use types::{Entity, EntityId, SearchResponse};
