use chrono::Utc;
use rusqlite::params;

use super::{DbError, DirectoryDb};
use crate::types::ScanSnapshot;

impl DirectoryDb {
    // =========================================================================
    // Scan snapshots (one per owner, always overwritten)
    // =========================================================================

    /// Replace the owner's snapshot in full. There is only ever one "last
    /// scan" per owner; this is a working view, not an append log.
    pub fn set_scan(&self, owner_id: &str, snapshot: &ScanSnapshot) -> Result<(), DbError> {
        let entries_json = serde_json::to_string(&snapshot.entries)?;
        self.conn.execute(
            "INSERT INTO scans (owner_id, date, entries_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                date = excluded.date,
                entries_json = excluded.entries_json,
                updated_at = excluded.updated_at",
            params![owner_id, snapshot.date, entries_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// The owner's current snapshot, if any scan has been confirmed.
    pub fn get_scan(&self, owner_id: &str) -> Result<Option<ScanSnapshot>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, entries_json FROM scans WHERE owner_id = ?1")?;
        let mut rows = stmt.query_map(params![owner_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        match rows.next() {
            Some(row) => {
                let (date, entries_json) = row?;
                let entries = serde_json::from_str(&entries_json)?;
                Ok(Some(ScanSnapshot { date, entries }))
            }
            None => Ok(None),
        }
    }

    /// Drop the owner's snapshot.
    pub fn delete_scan(&self, owner_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM scans WHERE owner_id = ?1", params![owner_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::types::ExtractedEntry;

    fn snapshot(date: &str, names: &[&str]) -> ScanSnapshot {
        ScanSnapshot {
            date: date.to_string(),
            entries: names
                .iter()
                .map(|n| ExtractedEntry {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn test_set_scan_overwrites_not_appends() {
        let (_dir, db) = test_db();
        db.set_scan("u1", &snapshot("2024-05-01", &["Ana", "Luis"])).unwrap();
        db.set_scan("u1", &snapshot("2024-05-08", &["Carlos"])).unwrap();

        let scan = db.get_scan("u1").unwrap().expect("snapshot exists");
        assert_eq!(scan.date, "2024-05-08");
        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.entries[0].name, "Carlos");
    }

    #[test]
    fn test_get_scan_missing_owner() {
        let (_dir, db) = test_db();
        assert!(db.get_scan("nobody").unwrap().is_none());
    }

    #[test]
    fn test_delete_scan() {
        let (_dir, db) = test_db();
        db.set_scan("u1", &snapshot("2024-05-01", &["Ana"])).unwrap();
        db.delete_scan("u1").unwrap();
        assert!(db.get_scan("u1").unwrap().is_none());
    }
}
