//! Domain types shared across the directory, reconciliation, and extraction
//! layers.
//!
//! Serde field names are camelCase to stay wire-compatible with the
//! extraction schema and the exported JSON the presentation layer consumes.

use serde::{Deserialize, Serialize};

/// A single desired-reference note, date-stamped to the meeting it was
/// written on. A member holds at most one reference per distinct date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    /// ISO date (YYYY-MM-DD) of the meeting the note was captured at.
    pub date: String,
    pub text: String,
}

/// A permanent directory entry for a recurring attendee.
///
/// `id` is derived from the owner id plus the normalized display name
/// (see [`crate::identity::entity_key`]) and is stable across re-scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    /// Owning account. Every entity is scoped to exactly one owner.
    pub owner_id: String,
    pub name: String,
    pub company: String,
    pub sector: String,
    pub phone: String,
    pub created_at: String,
    /// Most recent first. Display order only; the per-date uniqueness
    /// invariant is what matters.
    pub references: Vec<Reference>,
}

/// A one-off visitor row. Guests are never deduplicated: the same person
/// attending two meetings yields two records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub company: String,
    pub sector: String,
    pub phone: String,
    pub visit_date: String,
    /// Weak reference to the inviting member; empty when no match was found.
    pub invited_by_member_id: String,
    pub invited_by_member_name: String,
}

/// One raw row as produced by the extraction collaborator, before any
/// identity resolution. Field names match the extraction response schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntry {
    #[serde(default)]
    pub row_number: u32,
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub handwritten_request: String,
    #[serde(default)]
    pub is_guest: bool,
    /// Free text naming the inviting member, only meaningful when
    /// `is_guest` is true. Not yet resolved to an id.
    #[serde(default)]
    pub invited_by_name: String,
}

/// The single most-recent scan for an owner: raw rows plus the meeting
/// date, retained for review and correction. Overwritten in full by every
/// confirmed scan; a working view, not an append log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub date: String,
    pub entries: Vec<ExtractedEntry>,
}

/// Editable fields of a snapshot row, used by the snapshot editor to name
/// which column of the review table was corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryField {
    Name,
    Company,
    Sector,
    Phone,
    HandwrittenRequest,
    InvitedByName,
}

/// An account in the approval workflow. The first registered account is an
/// approved admin; everyone else waits for approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_approved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    /// Parse from SQL string.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

/// A row that could not be merged, with enough context to show the user
/// which line of the sheet needs attention.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    /// Position of the row in the confirmed batch.
    pub index: usize,
    /// Display name as extracted, possibly empty.
    pub name: String,
    pub message: String,
}

/// Outcome of one reconciliation run. A batch is never all-or-nothing:
/// rows that failed are listed here while the rest stay applied.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub date: String,
    pub members_created: usize,
    pub members_updated: usize,
    pub guests_added: usize,
    /// Rows skipped for data-quality reasons (e.g. empty name).
    pub skipped: Vec<RowIssue>,
    /// Rows whose persistence failed. Safe to re-run the whole batch.
    pub failed: Vec<RowIssue>,
    /// Set when the final snapshot overwrite failed. The member and guest
    /// rows counted above stayed applied; a full re-run is safe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_error: Option<String>,
}

impl ReconcileReport {
    /// True when every row was either merged or deliberately skipped and
    /// the snapshot overwrite went through.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.snapshot_error.is_none()
    }
}
