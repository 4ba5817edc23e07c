//! Data-access facade of the metering customer portal.
//!
//! [`Portal`] ties the backend client, the response cache and the export
//! workflows together. Reads are described by [`resources`] and consumed
//! either once ([`Portal::fetch`]) or live ([`Portal::subscribe`]).

pub mod config;
pub mod export;
mod portal;
pub mod resources;
pub mod sink;

pub use config::{Config, ConfigError};
pub use export::{ExportKind, ExportManager, ExportParams, ExportState, Exports, Triggered};
pub use portal::{OccupantUpdate, Portal};
pub use resources::Resource;
pub use sink::{DirectorySink, Document, DownloadSink, SinkError};
