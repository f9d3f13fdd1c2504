use crate::error::{CoreError, CoreResult};
use crate::store::{self, Mark, Subject, MARK_COLUMNS};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

pub const MAX_SCORE: f64 = 20.0;
const BULK_RECORD_MAX_ENTRIES: usize = 5000;

/// One row of a batch save. `score: None` clears the pupil's mark.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkEntry {
    pub pupil_id: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub recorded: usize,
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub pupil_id: String,
    pub name: String,
    pub admission_number: String,
    pub mark_id: Option<String>,
    pub score: Option<f64>,
}

/// Every pupil of a subject's class next to their mark for one term.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksSheet {
    pub subject: Subject,
    pub term: String,
    pub rows: Vec<SheetRow>,
}

pub fn validate_score(score: f64) -> CoreResult<f64> {
    if !score.is_finite() {
        return Err(CoreError::validation("score must be a finite number"));
    }
    if !(0.0..=MAX_SCORE).contains(&score) {
        return Err(CoreError::validation(format!(
            "score must be between 0 and {}, got {}",
            MAX_SCORE, score
        )));
    }
    Ok(score)
}

/// Records a score for (pupil, subject, term), replacing any existing score in place.
pub fn record_mark(
    conn: &Connection,
    pupil_id: &str,
    subject_id: &str,
    term: &str,
    score: f64,
) -> CoreResult<Mark> {
    let score = validate_score(score)?;
    let term = store::required_text(term, "term")?;

    let tx = conn.unchecked_transaction()?;
    let subject = load_subject(&tx, subject_id)?;
    let mark = record_mark_in(&tx, pupil_id, &subject, &term, score)?;
    tx.commit()?;
    Ok(mark)
}

fn load_subject(conn: &Connection, subject_id: &str) -> CoreResult<Subject> {
    store::get_subject(conn, subject_id)?.ok_or_else(|| CoreError::not_found("subject not found"))
}

fn check_pupil_in_class(conn: &Connection, pupil_id: &str, subject: &Subject) -> CoreResult<()> {
    let Some(pupil) = store::get_pupil(conn, pupil_id)? else {
        return Err(CoreError::not_found(format!("pupil not found: {}", pupil_id)));
    };
    if pupil.class_id != subject.class_id {
        return Err(CoreError::validation(format!(
            "subject {} does not belong to the class of pupil {}",
            subject.id, pupil.id
        )));
    }
    Ok(())
}

fn record_mark_in(
    conn: &Connection,
    pupil_id: &str,
    subject: &Subject,
    term: &str,
    score: f64,
) -> CoreResult<Mark> {
    check_pupil_in_class(conn, pupil_id, subject)?;

    // Single conditional write keyed by the triple: an existing row keeps its id.
    let mark_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO marks(id, pupil_id, subject_id, term, score, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(pupil_id, subject_id, term) DO UPDATE SET
           score = excluded.score,
           recorded_at = excluded.recorded_at",
        (
            &mark_id,
            pupil_id,
            &subject.id,
            term,
            score,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;

    let mark = conn
        .query_row(
            &format!(
                "SELECT {} FROM marks WHERE pupil_id = ? AND subject_id = ? AND term = ?",
                MARK_COLUMNS
            ),
            (pupil_id, &subject.id, term),
            store::mark_from_row,
        )
        .optional()?
        .ok_or_else(|| CoreError::not_found("mark not found after write"))?;
    log::debug!(
        "recorded {} for pupil {} subject {} ({})",
        score,
        pupil_id,
        subject.id,
        term
    );
    Ok(mark)
}

/// Removes the mark for the triple, returning whether one existed.
pub fn clear_mark(
    conn: &Connection,
    pupil_id: &str,
    subject_id: &str,
    term: &str,
) -> CoreResult<bool> {
    let term = store::required_text(term, "term")?;
    let removed = conn.execute(
        "DELETE FROM marks WHERE pupil_id = ? AND subject_id = ? AND term = ?",
        (pupil_id, subject_id, &term),
    )?;
    Ok(removed > 0)
}

pub fn delete_mark(conn: &Connection, mark_id: &str) -> CoreResult<bool> {
    let removed = conn.execute("DELETE FROM marks WHERE id = ?", [mark_id])?;
    Ok(removed > 0)
}

/// Applies a marks-entry save for one subject: every entry or none.
pub fn record_marks(
    conn: &Connection,
    subject_id: &str,
    term: &str,
    entries: &[MarkEntry],
) -> CoreResult<BulkOutcome> {
    if entries.len() > BULK_RECORD_MAX_ENTRIES {
        return Err(CoreError::validation(format!(
            "too many entries: {} (max {})",
            entries.len(),
            BULK_RECORD_MAX_ENTRIES
        )));
    }
    let term = store::required_text(term, "term")?;
    for (i, entry) in entries.iter().enumerate() {
        if let Some(score) = entry.score {
            validate_score(score).map_err(|e| {
                CoreError::validation(format!("entry {} (pupil {}): {}", i, entry.pupil_id, e))
            })?;
        }
    }

    let tx = conn.unchecked_transaction()?;
    let subject = load_subject(&tx, subject_id)?;
    let mut outcome = BulkOutcome::default();
    for entry in entries {
        match entry.score {
            Some(score) => {
                record_mark_in(&tx, &entry.pupil_id, &subject, &term, score)?;
                outcome.recorded += 1;
            }
            None => {
                check_pupil_in_class(&tx, &entry.pupil_id, &subject)?;
                let removed = tx.execute(
                    "DELETE FROM marks WHERE pupil_id = ? AND subject_id = ? AND term = ?",
                    (&entry.pupil_id, &subject.id, &term),
                )?;
                outcome.cleared += removed;
            }
        }
    }
    tx.commit()?;
    log::info!(
        "saved marks for subject {} ({}): {} recorded, {} cleared",
        subject.id,
        term,
        outcome.recorded,
        outcome.cleared
    );
    Ok(outcome)
}

pub fn marks_sheet(conn: &Connection, subject_id: &str, term: &str) -> CoreResult<MarksSheet> {
    let term = store::required_text(term, "term")?;
    let subject = load_subject(conn, subject_id)?;
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.admission_number, m.id, m.score
         FROM pupils p
         LEFT JOIN marks m
           ON m.pupil_id = p.id AND m.subject_id = ? AND m.term = ?
         WHERE p.class_id = ?
         ORDER BY p.name COLLATE NOCASE, p.id",
    )?;
    let rows = stmt
        .query_map((&subject.id, &term, &subject.class_id), |r| {
            Ok(SheetRow {
                pupil_id: r.get(0)?,
                name: r.get(1)?,
                admission_number: r.get(2)?,
                mark_id: r.get(3)?,
                score: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MarksSheet {
        subject,
        term,
        rows,
    })
}
