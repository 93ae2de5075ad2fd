//! Identifier resolution for crosslink.
//!
//! [`ResolverClient`] turns source-platform [`Identifier`]s into [`Target`]s.
//! Lookups go through a [`TieredCache`] first (volatile, bounded, persistent)
//! and only the remaining misses are sent over the [`Transport`] as one
//! batched call.
//!
//! [`Identifier`]: crosslink_primitives::Identifier
//! [`Target`]: crosslink_primitives::Target

pub mod backoff;
pub mod cache;
pub mod client;
pub mod transport;

pub use backoff::Backoff;
pub use cache::{CacheLookup, CacheStats, JsonFileStore, MemoryStore, PersistentStore, StoreError, StoreLookup, Tier, TieredCache};
pub use client::{LookupRequest, Resolution, Resolutions, ResolverClient, ResolverConfig};
pub use transport::{FixtureTransport, Transport, TransportError, WireId, WireResponse, WireTarget};
