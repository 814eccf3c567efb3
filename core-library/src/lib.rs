//! # Core Library
//!
//! Library content for the player: the track and folder models, the scanner
//! seams, and the reconciler that turns many independent scans into one
//! change-detected library.
//!
//! ## Modules
//!
//! - [`models`] - `Track`, `MusicFolder`, `ScanResult`
//! - [`scanner`] - `LibraryScanner` and `CoverResolver` host traits
//! - [`revision`] - combined revision fingerprint and gate
//! - [`reconciler`] - multi-source merge with remote caching
//! - [`folders`] - folder forest navigation
//! - [`covers`] - cover locator cache
//! - `local` - filesystem scanner (feature `local-scanner`)

pub mod config;
pub mod covers;
pub mod error;
pub mod folders;
pub mod models;
pub mod reconciler;
pub mod revision;
pub mod scanner;

#[cfg(feature = "local-scanner")]
pub mod local;

pub use config::LibraryConfig;
pub use covers::CoverCache;
pub use error::{LibraryError, Result};
pub use folders::FolderForest;
pub use models::{MusicFolder, ScanResult, Track, TrackSource};
pub use reconciler::{
    LibraryReconciler, LibrarySnapshot, LibrarySources, ReconcileOutcome, Reconciliation,
    SourceFailure,
};
pub use revision::RevisionGate;
pub use scanner::{CoverResolver, LibraryScanner, NoCovers, ScanSource};

#[cfg(feature = "local-scanner")]
pub use local::{EmbeddedCoverResolver, LocalFolderScanner};
