//! Reconciliation processor: turns one batch of freshly extracted rows for
//! a meeting date into directory mutations.
//!
//! Per entry, independently: guests are appended (never merged) with a
//! best-effort inviter link; member rows resolve to a stable entity key and
//! merge via fill-forward plus reference upsert. The batch is not
//! transactional — a row that fails to persist is reported and the rest
//! stay applied. Every merge is idempotent or additive, so re-running the
//! same batch is always safe (modulo duplicate guest rows).
//!
//! The per-member merge lives in [`merge_member_entry`] and is shared with
//! the snapshot editor so the two write paths cannot drift apart.

use chrono::Utc;
use uuid::Uuid;

use crate::db::{DbError, DirectoryDb};
use crate::identity::{entity_key, is_resolvable};
use crate::timeline::upsert_reference;
use crate::types::{
    ExtractedEntry, Guest, Member, ReconcileReport, RowIssue, ScanSnapshot,
};

/// Outcome of merging one member row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberMerge {
    Created,
    Updated,
}

/// Reconcile one confirmed scan: apply every entry in batch order, then
/// overwrite the owner's snapshot with the raw batch.
///
/// Always returns the report, even when the final snapshot write fails —
/// by that point rows have already been persisted, and the caller must be
/// able to say exactly which rows could not be confirmed without claiming
/// the whole scan failed. Check [`ReconcileReport::is_clean`].
pub fn reconcile(
    db: &DirectoryDb,
    owner_id: &str,
    entries: &[ExtractedEntry],
    date: &str,
) -> ReconcileReport {
    let mut report = ReconcileReport {
        date: date.to_string(),
        ..Default::default()
    };

    for (index, entry) in entries.iter().enumerate() {
        if !is_resolvable(&entry.name) {
            log::warn!("Skipping row {}: empty name after normalization", index);
            report.skipped.push(RowIssue {
                index,
                name: entry.name.clone(),
                message: "Row has no readable name".to_string(),
            });
            continue;
        }

        let applied = if entry.is_guest {
            apply_guest_entry(db, owner_id, entry, date).map(|_| None)
        } else {
            merge_member_entry(db, owner_id, entry, date).map(Some)
        };

        match applied {
            Ok(Some(MemberMerge::Created)) => report.members_created += 1,
            Ok(Some(MemberMerge::Updated)) => report.members_updated += 1,
            Ok(None) => report.guests_added += 1,
            Err(e) => {
                log::warn!("Row {} ({}) failed to persist: {}", index, entry.name, e);
                report.failed.push(RowIssue {
                    index,
                    name: entry.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    // The snapshot is the single "last scan" view: full overwrite, raw rows.
    let snapshot = ScanSnapshot {
        date: date.to_string(),
        entries: entries.to_vec(),
    };
    if let Err(e) = db.set_scan(owner_id, &snapshot) {
        log::warn!("Snapshot overwrite failed for {}: {}", owner_id, e);
        report.snapshot_error = Some(e.to_string());
    }

    report
}

/// The shared per-member merge: identity resolve → fill-forward →
/// reference upsert → persist. Invoked from both fresh scans and snapshot
/// edits so the two entry points stay one code path.
pub fn merge_member_entry(
    db: &DirectoryDb,
    owner_id: &str,
    entry: &ExtractedEntry,
    date: &str,
) -> Result<MemberMerge, DbError> {
    let key = entity_key(owner_id, &entry.name);

    let mut member = match db.get_member(&key)? {
        Some(mut existing) => {
            // Fill-forward: an empty incoming field never erases stored data.
            fill_forward(&mut existing.company, &entry.company);
            fill_forward(&mut existing.sector, &entry.sector);
            fill_forward(&mut existing.phone, &entry.phone);
            existing
        }
        None => Member {
            id: key,
            owner_id: owner_id.to_string(),
            name: entry.name.trim().to_string(),
            company: entry.company.clone(),
            sector: entry.sector.clone(),
            phone: entry.phone.clone(),
            created_at: Utc::now().to_rfc3339(),
            references: Vec::new(),
        },
    };

    upsert_reference(&mut member, date, &entry.handwritten_request);

    let inserted = db.upsert_member(&member)?;
    Ok(if inserted {
        MemberMerge::Created
    } else {
        MemberMerge::Updated
    })
}

/// Append a guest row with a fresh id and a best-effort inviter link.
fn apply_guest_entry(
    db: &DirectoryDb,
    owner_id: &str,
    entry: &ExtractedEntry,
    date: &str,
) -> Result<(), DbError> {
    let members = db.list_members(owner_id)?;
    let inviter = find_inviter(&members, &entry.invited_by_name);

    let (invited_by_member_id, invited_by_member_name) = match inviter {
        Some(m) => (m.id.clone(), m.name.clone()),
        // Known gap: the raw inviter text is dropped on a failed match.
        None => (String::new(), String::new()),
    };

    db.insert_guest(&Guest {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        name: entry.name.trim().to_string(),
        company: entry.company.clone(),
        sector: entry.sector.clone(),
        phone: entry.phone.clone(),
        visit_date: date.to_string(),
        invited_by_member_id,
        invited_by_member_name,
    })
}

/// Case-insensitive substring match of the extracted inviter text against
/// member display names; first match in list order wins. A heuristic, not a
/// guarantee — blank text never matches.
fn find_inviter<'a>(members: &'a [Member], invited_by_name: &str) -> Option<&'a Member> {
    let needle = invited_by_name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    members
        .iter()
        .find(|m| m.name.to_lowercase().contains(&needle))
}

fn fill_forward(stored: &mut String, incoming: &str) {
    if !incoming.trim().is_empty() {
        *stored = incoming.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn member_entry(name: &str, request: &str) -> ExtractedEntry {
        ExtractedEntry {
            name: name.to_string(),
            handwritten_request: request.to_string(),
            ..Default::default()
        }
    }

    fn guest_entry(name: &str, invited_by: &str) -> ExtractedEntry {
        ExtractedEntry {
            name: name.to_string(),
            is_guest: true,
            invited_by_name: invited_by.to_string(),
            ..Default::default()
        }
    }

    fn reference_content(m: &Member) -> Vec<(String, String)> {
        m.references
            .iter()
            .map(|r| (r.date.clone(), r.text.clone()))
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (_dir, db) = test_db();
        let batch = vec![
            member_entry("Ana Gómez", "Necesito contador"),
            guest_entry("Luis Pérez", "Ana"),
        ];

        let report = reconcile(&db, "u1", &batch, "2024-05-01");
        assert!(report.is_clean());
        assert_eq!(report.members_created, 1);
        assert_eq!(report.guests_added, 1);

        let member = db.get_member("u1_ana-gómez").unwrap().expect("member created");
        assert_eq!(
            reference_content(&member),
            vec![("2024-05-01".to_string(), "Necesito contador".to_string())]
        );

        let guests = db.list_guests("u1").unwrap();
        assert_eq!(guests.len(), 1);
        assert_eq!(guests[0].invited_by_member_id, member.id);
        assert_eq!(guests[0].invited_by_member_name, "Ana Gómez");
        assert_eq!(guests[0].visit_date, "2024-05-01");

        let scan = db.get_scan("u1").unwrap().expect("snapshot written");
        assert_eq!(scan.date, "2024-05-01");
        assert_eq!(scan.entries, batch);
    }

    #[test]
    fn test_rescan_is_idempotent_for_members() {
        let (_dir, db) = test_db();
        let batch = vec![
            member_entry("Ana Gómez", "Necesito contador"),
            member_entry("Carlos Díaz", ""),
        ];

        reconcile(&db, "u1", &batch, "2024-05-01");
        let once: Vec<_> = db
            .list_members("u1")
            .unwrap()
            .iter()
            .map(reference_content)
            .collect();

        reconcile(&db, "u1", &batch, "2024-05-01");
        let twice: Vec<_> = db
            .list_members("u1")
            .unwrap()
            .iter()
            .map(reference_content)
            .collect();

        assert_eq!(once, twice);
        assert_eq!(db.list_members("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_rescan_duplicates_guests_only() {
        let (_dir, db) = test_db();
        let batch = vec![guest_entry("Luis Pérez", "")];

        reconcile(&db, "u1", &batch, "2024-05-01");
        reconcile(&db, "u1", &batch, "2024-05-01");

        // Known limitation: guest rows are additive, re-runs duplicate them.
        assert_eq!(db.list_guests("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_fill_forward_never_blanks_fields() {
        let (_dir, db) = test_db();
        let mut first = member_entry("Ana Gómez", "");
        first.company = "Acme".to_string();
        first.phone = "555-0101".to_string();
        reconcile(&db, "u1", &[first], "2024-05-01");

        // Next week's scan couldn't read the company cell
        let mut second = member_entry("Ana Gómez", "");
        second.phone = "555-0202".to_string();
        reconcile(&db, "u1", &[second], "2024-05-08");

        let member = db.get_member("u1_ana-gómez").unwrap().unwrap();
        assert_eq!(member.company, "Acme", "empty incoming field kept stored value");
        assert_eq!(member.phone, "555-0202", "non-empty incoming field applied");
    }

    #[test]
    fn test_same_person_spaced_differently_resolves_once() {
        let (_dir, db) = test_db();
        reconcile(&db, "u1", &[member_entry("  Ana   Gómez", "A")], "2024-05-01");
        reconcile(&db, "u1", &[member_entry("ana gómez", "B")], "2024-05-01");

        let members = db.list_members("u1").unwrap();
        assert_eq!(members.len(), 1);
        // Second scan replaced the same-date reference in place
        assert_eq!(
            reference_content(&members[0]),
            vec![("2024-05-01".to_string(), "B".to_string())]
        );
    }

    #[test]
    fn test_empty_name_rows_are_skipped_with_warning() {
        let (_dir, db) = test_db();
        let batch = vec![member_entry("   ", "text"), member_entry("Ana Gómez", "")];

        let report = reconcile(&db, "u1", &batch, "2024-05-01");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 0);
        assert_eq!(report.members_created, 1);
        assert_eq!(db.list_members("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_unmatched_inviter_leaves_link_empty() {
        let (_dir, db) = test_db();
        reconcile(&db, "u1", &[member_entry("Ana Gómez", "")], "2024-05-01");

        let report = reconcile(
            &db,
            "u1",
            &[guest_entry("Luis Pérez", "Roberto")],
            "2024-05-01",
        );
        assert!(report.is_clean());

        let guests = db.list_guests("u1").unwrap();
        assert_eq!(guests[0].invited_by_member_id, "");
        assert_eq!(guests[0].invited_by_member_name, "");
    }

    #[test]
    fn test_inviter_match_is_first_in_list_order() {
        let (_dir, db) = test_db();
        reconcile(
            &db,
            "u1",
            &[member_entry("Ana María López", ""), member_entry("Ana Gómez", "")],
            "2024-05-01",
        );

        reconcile(&db, "u1", &[guest_entry("Luis Pérez", "ana")], "2024-05-08");

        // list order is alphabetical, so "Ana Gómez" wins over "Ana María López"
        let guests = db.list_guests("u1").unwrap();
        assert_eq!(guests[0].invited_by_member_name, "Ana Gómez");
    }

    #[test]
    fn test_two_rows_same_identity_last_write_wins() {
        let (_dir, db) = test_db();
        let mut a = member_entry("Ana Gómez", "first note");
        a.company = "Acme".to_string();
        let mut b = member_entry("ANA GÓMEZ", "second note");
        b.company = "Beta".to_string();

        reconcile(&db, "u1", &[a, b], "2024-05-01");

        let members = db.list_members("u1").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].company, "Beta");
        assert_eq!(
            reference_content(&members[0]),
            vec![("2024-05-01".to_string(), "second note".to_string())]
        );
    }

    #[test]
    fn test_failed_row_is_reported_and_rest_stay_applied() {
        let (_dir, db) = test_db();
        db.conn_ref().execute_batch("DROP TABLE guests;").unwrap();

        let batch = vec![
            member_entry("Ana Gómez", "Necesito contador"),
            guest_entry("Luis Pérez", "Ana"),
        ];
        let report = reconcile(&db, "u1", &batch, "2024-05-01");

        assert_eq!(report.members_created, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert!(!report.is_clean());
        // The member row stayed applied and the snapshot was still written.
        assert!(db.get_member("u1_ana-gómez").unwrap().is_some());
        assert_eq!(db.get_scan("u1").unwrap().unwrap().entries.len(), 2);
    }

    #[test]
    fn test_snapshot_write_failure_keeps_row_outcomes() {
        let (_dir, db) = test_db();
        db.conn_ref().execute_batch("DROP TABLE scans;").unwrap();

        let report = reconcile(&db, "u1", &[member_entry("Ana Gómez", "x")], "2024-05-01");

        assert_eq!(report.members_created, 1);
        assert!(report.failed.is_empty());
        assert!(report.snapshot_error.is_some());
        assert!(!report.is_clean());
        assert!(db.get_member("u1_ana-gómez").unwrap().is_some());
    }

    #[test]
    fn test_partial_run_then_full_rerun_converges() {
        let (_dir, db) = test_db();
        let batch = vec![
            member_entry("Ana Gómez", "A"),
            member_entry("Carlos Díaz", "C"),
        ];

        // Simulate a run that died after the first entry: apply a prefix.
        reconcile(&db, "u1", &batch[..1], "2024-05-01");
        // Caller retries the whole batch.
        reconcile(&db, "u1", &batch, "2024-05-01");

        // End state equals a single clean run.
        let (_dir2, fresh) = test_db();
        reconcile(&fresh, "u1", &batch, "2024-05-01");

        let state = |db: &DirectoryDb| {
            db.list_members("u1")
                .unwrap()
                .iter()
                .map(|m| (m.id.clone(), m.company.clone(), reference_content(m)))
                .collect::<Vec<_>>()
        };
        assert_eq!(state(&db), state(&fresh));
        assert_eq!(db.get_scan("u1").unwrap(), fresh.get_scan("u1").unwrap());
    }
}
