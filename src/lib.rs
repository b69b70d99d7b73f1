//! rollbook — attendance reconciliation for weekly networking meetings.
//!
//! A scanned sign-in sheet arrives as a batch of raw rows; the engine
//! resolves each row to a stable identity, merges per-date reference
//! requests without duplicating on re-scan, links guests to the member who
//! invited them, and keeps the transient "last scan" view consistent with
//! the permanent directory under later manual edits.
//!
//! Layering, bottom up: [`identity`] and [`timeline`] are pure;
//! [`db`] is the SQLite store; [`services`] carry the merge and account
//! logic; [`directory`] is the observed per-owner surface; [`extract`] is
//! the external OCR collaborator.

pub mod db;
pub mod directory;
pub mod error;
pub mod extract;
pub mod identity;
mod migrations;
pub mod services;
pub mod timeline;
pub mod types;

pub use db::{DbError, DirectoryDb, MemberProfileUpdate};
pub use directory::Directory;
pub use error::AppError;
pub use extract::{ExtractError, GeminiExtractor, SheetExtractor};
pub use services::accounts::AuthError;
pub use services::reconcile::reconcile;
pub use services::snapshot::SnapshotEditError;
pub use types::{
    EntryField, ExtractedEntry, Guest, Member, ReconcileReport, Reference, RowIssue,
    ScanSnapshot, User, UserRole,
};

/// Initialize env-filtered logging for binaries and examples. Safe to call
/// more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
