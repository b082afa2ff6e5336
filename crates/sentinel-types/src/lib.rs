//! Common types used throughout Sentinel.
//!
//! This crate holds the data model exchanged between a broadcaster and
//! its agents ([`Resource`], [`ChangedEvent`]) together with the text
//! stream codec in [`wire`], so both ends of a stream agree on framing.

mod error;
mod event;
mod resource;
pub mod wire;

pub use error::CodecError;
pub use event::{Action, ChangedEvent};
pub use resource::{Resource, ResourceKey, ResourceQuery, ResourceType};
