//! Carryall - artifact cache and synchronization engine
//!
//! Captures container images, git repositories and downloaded files into one
//! archive directory described by a checksum ledger, and restores them
//! elsewhere, typically on the far side of an air gap.

pub mod archive;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod image;
pub mod ledger;
pub mod orchestration;
pub mod sync;
pub mod transfer;
pub mod ui;
pub mod vcs;

pub use error::{CarryallError, CarryallResult};
