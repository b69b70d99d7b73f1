//! Per-owner directory handle: the upward surface the presentation layer
//! talks to.
//!
//! Holds the SQLite store behind a `std::sync::Mutex` (mutations are
//! user-triggered and run one at a time per account) and pushes the current
//! full result set through `tokio::sync::watch` channels after every
//! change. Watch semantics collapse a burst of writes — one reconciliation
//! can touch many rows — into the final state per collection, never
//! reordering and never requiring a manual refresh.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::db::{DbError, DirectoryDb, MemberProfileUpdate};
use crate::services::reconcile::reconcile;
use crate::services::snapshot::{edit_snapshot_field, SnapshotEditError};
use crate::timeline::set_reference_text;
use crate::types::{
    EntryField, ExtractedEntry, Guest, Member, ReconcileReport, ScanSnapshot,
};

/// Observed directory handle for one owning account.
pub struct Directory {
    db: Arc<Mutex<DirectoryDb>>,
    owner_id: String,
    members_tx: watch::Sender<Vec<Member>>,
    guests_tx: watch::Sender<Vec<Guest>>,
    last_scan_tx: watch::Sender<Option<ScanSnapshot>>,
}

impl Directory {
    /// Open a handle scoped to `owner_id`, seeding the observed collections
    /// with the current stored state.
    pub fn for_owner(db: Arc<Mutex<DirectoryDb>>, owner_id: &str) -> Result<Self, DbError> {
        let (members, guests, last_scan) = {
            let guard = db.lock().map_err(|_| DbError::LockPoisoned)?;
            (
                guard.list_members(owner_id)?,
                guard.list_guests(owner_id)?,
                guard.get_scan(owner_id)?,
            )
        };

        let (members_tx, _) = watch::channel(members);
        let (guests_tx, _) = watch::channel(guests);
        let (last_scan_tx, _) = watch::channel(last_scan);

        Ok(Self {
            db,
            owner_id: owner_id.to_string(),
            members_tx,
            guests_tx,
            last_scan_tx,
        })
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    // =========================================================================
    // Observed collections
    // =========================================================================

    /// Current members, alphabetical. A point-in-time copy; use
    /// [`Self::subscribe_members`] for continuous observation.
    pub fn members(&self) -> Vec<Member> {
        self.members_tx.borrow().clone()
    }

    pub fn guests(&self) -> Vec<Guest> {
        self.guests_tx.borrow().clone()
    }

    pub fn last_scan(&self) -> Option<ScanSnapshot> {
        self.last_scan_tx.borrow().clone()
    }

    /// Receiver that yields the full member list on every change.
    pub fn subscribe_members(&self) -> watch::Receiver<Vec<Member>> {
        self.members_tx.subscribe()
    }

    pub fn subscribe_guests(&self) -> watch::Receiver<Vec<Guest>> {
        self.guests_tx.subscribe()
    }

    pub fn subscribe_last_scan(&self) -> watch::Receiver<Option<ScanSnapshot>> {
        self.last_scan_tx.subscribe()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Reconcile one confirmed scan batch. Partial failures are reported,
    /// not rolled back; re-running the same batch is safe.
    pub fn add_or_update_members(
        &self,
        entries: &[ExtractedEntry],
        date: &str,
    ) -> Result<ReconcileReport, DbError> {
        let report = {
            let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
            reconcile(&db, &self.owner_id, entries, date)
        };
        // Rows may have landed even when the run reported problems, so
        // observers get whatever the store holds now, clean run or not.
        self.notify_all();
        Ok(report)
    }

    pub fn get_member(&self, id: &str) -> Result<Option<Member>, DbError> {
        let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
        db.get_member(id)
    }

    /// Delete a member. Guests that name it as inviter keep their weak
    /// reference (no cascade).
    pub fn delete_member(&self, id: &str) -> Result<(), DbError> {
        let result = {
            let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
            db.delete_member(id)
        };
        self.notify_members();
        result
    }

    /// Manual profile edit. Applies exactly the provided fields; this is an
    /// owner correcting the record, not a scan, so fill-forward does not
    /// apply here.
    pub fn update_member_profile(
        &self,
        id: &str,
        update: &MemberProfileUpdate,
    ) -> Result<(), DbError> {
        let result = {
            let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
            db.update_member_profile(id, update)
        };
        self.notify_members();
        result
    }

    /// Correct the text of one reference by id on the member detail view.
    pub fn update_reference(
        &self,
        member_id: &str,
        ref_id: &str,
        text: &str,
    ) -> Result<(), DbError> {
        let result = {
            let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
            match db.get_member(member_id)? {
                Some(mut member) => {
                    set_reference_text(&mut member, ref_id, text);
                    db.upsert_member(&member).map(|_| ())
                }
                None => Ok(()),
            }
        };
        self.notify_members();
        result
    }

    /// Correct one field of one row of the last scan; member-affecting
    /// corrections propagate through the ingest merge path.
    pub fn update_last_scan_entry(
        &self,
        index: usize,
        field: EntryField,
        value: &str,
    ) -> Result<ScanSnapshot, SnapshotEditError> {
        let result = {
            let db = self
                .db
                .lock()
                .map_err(|_| SnapshotEditError::Db(DbError::LockPoisoned))?;
            edit_snapshot_field(&db, &self.owner_id, index, field, value)
        };
        // The snapshot overwrite may have persisted even when the member
        // merge failed afterwards, so observers must be shown the stored
        // rows in either case rather than the pre-edit view.
        self.notify_all();
        result
    }

    /// Delete everything this owner stores: members, guests, and the
    /// snapshot. The account record itself survives.
    pub fn clear_all(&self) -> Result<(), DbError> {
        let result = {
            let db = self.db.lock().map_err(|_| DbError::LockPoisoned)?;
            db.clear_owner_data(&self.owner_id)
        };
        self.notify_all();
        result
    }

    // =========================================================================
    // Change notification
    // =========================================================================

    /// Push the stored member list to observers. Best effort: if the
    /// re-read fails, the channel keeps its previous value and the failure
    /// is logged. Runs after every mutation attempt, successful or not.
    fn notify_members(&self) {
        let members = self
            .db
            .lock()
            .map_err(|_| DbError::LockPoisoned)
            .and_then(|db| db.list_members(&self.owner_id));
        match members {
            Ok(members) => {
                self.members_tx.send_replace(members);
            }
            Err(e) => log::warn!("Member refresh failed for {}: {}", self.owner_id, e),
        }
    }

    /// Refresh all three observed collections, each independently best
    /// effort, so one unreadable collection cannot hold the others stale.
    fn notify_all(&self) {
        let db = match self.db.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("Refresh skipped for {}: storage lock poisoned", self.owner_id);
                return;
            }
        };
        match db.list_members(&self.owner_id) {
            Ok(members) => {
                self.members_tx.send_replace(members);
            }
            Err(e) => log::warn!("Member refresh failed for {}: {}", self.owner_id, e),
        }
        match db.list_guests(&self.owner_id) {
            Ok(guests) => {
                self.guests_tx.send_replace(guests);
            }
            Err(e) => log::warn!("Guest refresh failed for {}: {}", self.owner_id, e),
        }
        match db.get_scan(&self.owner_id) {
            Ok(last_scan) => {
                self.last_scan_tx.send_replace(last_scan);
            }
            Err(e) => log::warn!("Scan refresh failed for {}: {}", self.owner_id, e),
        }
    }
}
