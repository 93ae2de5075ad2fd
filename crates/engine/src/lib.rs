//! Annotation engine for externally rendered, continuously mutating documents.
//!
//! The host document is never owned: every element handle is re-validated
//! before use, and every asynchronous continuation re-checks the navigation
//! epoch before it writes. [`Session`] owns all state for one page context and
//! drives the pieces:
//!
//! - [`scan`] extracts and normalizes identifiers from host items,
//! - [`anchor`] ranks host elements an annotation can attach to,
//! - [`Reconciler`] resolves, places, heals, deduplicates and prunes,
//! - [`placement`] freezes geometry while the user interacts with an annotation.

pub mod anchor;
pub mod config;
pub mod events;
pub mod gate;
pub mod host;
pub mod placement;
pub mod reconciler;
pub mod registry;
pub mod scan;
pub mod session;

pub use config::EngineConfig;
pub use events::{HostEvent, HoverDisposition, HoverReply};
pub use host::{AnchorRole, AnnotationView, ElementId, HostDocument, HostError, ItemCandidate, ItemHints, ItemPattern, ObserverId};
pub use reconciler::{PassReport, Reconciler};
pub use registry::{AnnotationRecord, AnnotationRegistry};
pub use session::Session;
