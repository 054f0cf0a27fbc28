//! usersearch: keystroke-driven user search with lazily cached avatars
//!
//! [`QueryController`] turns query text into a ranked list of users and
//! drops responses that a newer query has superseded. [`AssetCache`] fetches
//! each user's avatar at most once while it is pending or loaded. Both sit on
//! top of a [`RemoteClient`], with [`HttpClient`] as the reqwest implementation.

pub mod assets;
pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
mod inflight;
pub mod query;

#[cfg(test)]
mod testing;

pub use assets::{AssetCache, AssetSlot, Avatar, SlotChange};
pub use backend::{Entity, EntityId, HttpClient, RemoteClient};
pub use config::Config;
pub use error::{ConfigError, FetchError};
pub use query::{Phase, QueryController, QueryState};
