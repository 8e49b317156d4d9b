//! Archive ingestion core for NGAS.
//!
//! This crate implements the part of an NGAS-style archive server that turns
//! an incoming archive command into a durably stored, catalog-registered,
//! integrity-checked file on a chosen disk volume: volume selection, the
//! staging-area write path, the DAPI hand-off, and the catalog/cache/
//! subscription sequencing that follows a successful write.
//!
//! HTTP framing, the relational engine itself, logging configuration and the
//! CLI live one layer up, in the `ngas-server` binary crate.

pub mod cache;
pub mod catalog;
pub mod context;
pub mod coordinator;
pub mod dapi;
pub mod error;
pub mod fetch;
pub mod mime;
pub mod multipart;
pub mod request;
pub mod staging;
pub mod subscription;
pub mod volume;

pub use context::{ServerContext, ServerState, ServerSubstate};
pub use coordinator::ArchiveCoordinator;
pub use error::{NgasError, Result};
pub use request::ArchiveRequest;
pub use volume::Volume;
