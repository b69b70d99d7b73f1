//! Reference timeline: upsert-by-date over a member's desired-reference
//! notes.
//!
//! Invariant: at most one reference per distinct date per member. A re-scan
//! or edit for a date that already has a note replaces its text in place
//! instead of appending a duplicate, which is what makes re-running a whole
//! batch safe.

use uuid::Uuid;

use crate::types::{Member, Reference};

/// Insert or replace the reference for `date` on `member`.
///
/// Empty-after-trim text is a no-op: it neither creates a note nor removes
/// an existing one (a blank cell on a later scan must not erase history).
/// New notes go to the front so the list stays most-recent-first.
///
/// Idempotent: applying the same `(date, text)` twice leaves the list
/// content-identical to applying it once.
pub fn upsert_reference(member: &mut Member, date: &str, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    if let Some(existing) = member.references.iter_mut().find(|r| r.date == date) {
        existing.text = text.to_string();
        return;
    }

    member.references.insert(
        0,
        Reference {
            id: Uuid::new_v4().to_string(),
            date: date.to_string(),
            text: text.to_string(),
        },
    );
}

/// Replace the text of a specific reference by id (manual correction from
/// the member detail view). Unknown ids are ignored.
pub fn set_reference_text(member: &mut Member, ref_id: &str, text: &str) {
    if let Some(existing) = member.references.iter_mut().find(|r| r.id == ref_id) {
        existing.text = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_with_refs(refs: Vec<Reference>) -> Member {
        Member {
            id: "u1_ana-gómez".to_string(),
            owner_id: "u1".to_string(),
            name: "Ana Gómez".to_string(),
            company: String::new(),
            sector: String::new(),
            phone: String::new(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            references: refs,
        }
    }

    fn reference(date: &str, text: &str) -> Reference {
        Reference {
            id: Uuid::new_v4().to_string(),
            date: date.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_upsert_replaces_same_date_in_place() {
        let mut m = member_with_refs(vec![reference("2024-05-01", "A")]);
        upsert_reference(&mut m, "2024-05-01", "B");
        assert_eq!(m.references.len(), 1);
        assert_eq!(m.references[0].date, "2024-05-01");
        assert_eq!(m.references[0].text, "B");
    }

    #[test]
    fn test_upsert_new_date_prepends() {
        let mut m = member_with_refs(vec![reference("2024-05-01", "A")]);
        upsert_reference(&mut m, "2024-05-08", "B");
        assert_eq!(m.references.len(), 2);
        assert_eq!(m.references[0].date, "2024-05-08");
        assert_eq!(m.references[1].date, "2024-05-01");
    }

    #[test]
    fn test_empty_text_is_a_noop() {
        let mut m = member_with_refs(vec![reference("2024-05-01", "A")]);
        upsert_reference(&mut m, "2024-05-01", "");
        upsert_reference(&mut m, "2024-05-01", "   ");
        assert_eq!(m.references.len(), 1);
        assert_eq!(m.references[0].text, "A");

        // Also a no-op on a date with no existing note
        upsert_reference(&mut m, "2024-05-08", "  ");
        assert_eq!(m.references.len(), 1);
    }

    #[test]
    fn test_upsert_is_idempotent_by_content() {
        let mut once = member_with_refs(vec![]);
        upsert_reference(&mut once, "2024-05-01", "Necesito contador");

        let mut twice = member_with_refs(vec![]);
        upsert_reference(&mut twice, "2024-05-01", "Necesito contador");
        upsert_reference(&mut twice, "2024-05-01", "Necesito contador");

        let content =
            |m: &Member| m.references.iter().map(|r| (r.date.clone(), r.text.clone())).collect::<Vec<_>>();
        assert_eq!(content(&once), content(&twice));
    }

    #[test]
    fn test_set_reference_text_by_id() {
        let r = reference("2024-05-01", "A");
        let id = r.id.clone();
        let mut m = member_with_refs(vec![r]);

        set_reference_text(&mut m, &id, "corrected");
        assert_eq!(m.references[0].text, "corrected");

        set_reference_text(&mut m, "no-such-id", "x");
        assert_eq!(m.references[0].text, "corrected");
    }
}
