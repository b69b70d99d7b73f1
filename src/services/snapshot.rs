//! Snapshot editor: post-hoc correction of the stored "last scan" rows.
//!
//! An edit mutates the entry in place and re-persists the snapshot in full.
//! For member rows the correction is pushed back through the same merge
//! routine used at ingest time ([`crate::services::reconcile::merge_member_entry`]),
//! against the snapshot's stored date, so the permanent directory stays in
//! step with the transient view. Guest rows are view-only edits: the
//! correction does not reach the Guest record (deliberate limitation,
//! pending product input).

use thiserror::Error;

use crate::db::{DbError, DirectoryDb};
use crate::identity::is_resolvable;
use crate::services::reconcile::merge_member_entry;
use crate::types::{EntryField, ScanSnapshot};

#[derive(Debug, Error)]
pub enum SnapshotEditError {
    #[error("No scan snapshot exists for this account")]
    NoSnapshot,

    #[error("Snapshot row {0} does not exist")]
    IndexOutOfRange(usize),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Apply one field correction to the snapshot row at `index` and return the
/// updated snapshot (so a failed edit never silently reverts the caller's
/// view — the stored state is always what comes back).
pub fn edit_snapshot_field(
    db: &DirectoryDb,
    owner_id: &str,
    index: usize,
    field: EntryField,
    value: &str,
) -> Result<ScanSnapshot, SnapshotEditError> {
    let mut snapshot = db.get_scan(owner_id)?.ok_or(SnapshotEditError::NoSnapshot)?;
    let entry = snapshot
        .entries
        .get_mut(index)
        .ok_or(SnapshotEditError::IndexOutOfRange(index))?;

    match field {
        EntryField::Name => entry.name = value.to_string(),
        EntryField::Company => entry.company = value.to_string(),
        EntryField::Sector => entry.sector = value.to_string(),
        EntryField::Phone => entry.phone = value.to_string(),
        EntryField::HandwrittenRequest => entry.handwritten_request = value.to_string(),
        EntryField::InvitedByName => entry.invited_by_name = value.to_string(),
    }

    // Full overwrite, same as a confirmed scan.
    db.set_scan(owner_id, &snapshot)?;

    // Member rows re-enter the ingest merge against the snapshot's date.
    let entry = &snapshot.entries[index];
    if !entry.is_guest {
        if is_resolvable(&entry.name) {
            merge_member_entry(db, owner_id, entry, &snapshot.date)?;
        } else {
            log::warn!(
                "Snapshot row {} has no readable name after edit; directory not updated",
                index
            );
        }
    }

    Ok(snapshot)
}
