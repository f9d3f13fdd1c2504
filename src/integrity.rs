//! Cascading deletes and re-parenting across the Class → Subject/Pupil → Mark graph.
//!
//! Every operation runs in one transaction; a reader sees either the graph
//! before the operation or after it, never a half-applied cascade. Deleting an
//! id that does not exist succeeds and removes nothing.

use crate::error::{conflict_on_unique, CoreError, CoreResult};
use crate::store;
use rusqlite::Connection;
use serde::Serialize;

/// Rows removed by a delete, per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub classes: usize,
    pub subjects: usize,
    pub pupils: usize,
    pub marks: usize,
}

impl DeleteSummary {
    pub fn is_noop(&self) -> bool {
        *self == DeleteSummary::default()
    }
}

/// A subject or pupil that moved between classes. Rankings of both classes
/// are stale once this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reparented {
    pub entity_id: String,
    pub from_class_id: String,
    pub to_class_id: String,
}

impl Reparented {
    pub fn affected_class_ids(&self) -> Vec<String> {
        if self.from_class_id == self.to_class_id {
            return Vec::new();
        }
        vec![self.from_class_id.clone(), self.to_class_id.clone()]
    }
}

pub fn delete_class(conn: &Connection, class_id: &str) -> CoreResult<DeleteSummary> {
    let tx = conn.unchecked_transaction()?;

    // Dependency order: marks, then subjects and pupils, then the class.
    let marks = tx.execute(
        "DELETE FROM marks
         WHERE subject_id IN (SELECT id FROM subjects WHERE class_id = ?1)
            OR pupil_id IN (SELECT id FROM pupils WHERE class_id = ?1)",
        [class_id],
    )?;
    let subjects = tx.execute("DELETE FROM subjects WHERE class_id = ?", [class_id])?;
    let pupils = tx.execute("DELETE FROM pupils WHERE class_id = ?", [class_id])?;
    let classes = tx.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    tx.commit()?;

    let summary = DeleteSummary {
        classes,
        subjects,
        pupils,
        marks,
    };
    if !summary.is_noop() {
        log::info!(
            "deleted class {}: {} subjects, {} pupils, {} marks",
            class_id,
            subjects,
            pupils,
            marks
        );
    }
    Ok(summary)
}

pub fn delete_subject(conn: &Connection, subject_id: &str) -> CoreResult<DeleteSummary> {
    let tx = conn.unchecked_transaction()?;
    let marks = tx.execute("DELETE FROM marks WHERE subject_id = ?", [subject_id])?;
    let subjects = tx.execute("DELETE FROM subjects WHERE id = ?", [subject_id])?;
    tx.commit()?;

    if subjects > 0 || marks > 0 {
        log::info!("deleted subject {}: {} marks", subject_id, marks);
    }
    Ok(DeleteSummary {
        subjects,
        marks,
        ..DeleteSummary::default()
    })
}

pub fn delete_pupil(conn: &Connection, pupil_id: &str) -> CoreResult<DeleteSummary> {
    let tx = conn.unchecked_transaction()?;
    let marks = tx.execute("DELETE FROM marks WHERE pupil_id = ?", [pupil_id])?;
    let pupils = tx.execute("DELETE FROM pupils WHERE id = ?", [pupil_id])?;
    tx.commit()?;

    if pupils > 0 || marks > 0 {
        log::info!("deleted pupil {}: {} marks", pupil_id, marks);
    }
    Ok(DeleteSummary {
        pupils,
        marks,
        ..DeleteSummary::default()
    })
}

#[cfg(test)]
pub fn reparent_pupil(
    conn: &Connection,
    pupil_id: &str,
    new_class_id: &str,
) -> CoreResult<Reparented> {
    let tx = conn.unchecked_transaction()?;
    let moved = reparent_pupil_in(&tx, pupil_id, new_class_id, None)?;
    tx.commit()?;
    Ok(moved)
}

/// Moves a pupil inside the caller's transaction. Marks stay attached to the pupil.
/// `admission_number`, when given, is written together with the new class.
pub(crate) fn reparent_pupil_in(
    conn: &Connection,
    pupil_id: &str,
    new_class_id: &str,
    admission_number: Option<&str>,
) -> CoreResult<Reparented> {
    let Some(pupil) = store::get_pupil(conn, pupil_id)? else {
        return Err(CoreError::not_found("pupil not found"));
    };
    if !store::class_exists(conn, new_class_id)? {
        return Err(CoreError::not_found("target class not found"));
    }
    let moved = Reparented {
        entity_id: pupil.id.clone(),
        from_class_id: pupil.class_id.clone(),
        to_class_id: new_class_id.to_string(),
    };
    if pupil.class_id == new_class_id {
        return Ok(moved);
    }

    let admission_number = admission_number.unwrap_or(pupil.admission_number.as_str());
    conn.execute(
        "UPDATE pupils SET class_id = ?, admission_number = ? WHERE id = ?",
        (new_class_id, admission_number, &pupil.id),
    )
    .map_err(|e| {
        conflict_on_unique(e, "admission number already used in the target class")
    })?;
    log::info!(
        "moved pupil {} from class {} to {}",
        pupil.id,
        moved.from_class_id,
        moved.to_class_id
    );
    Ok(moved)
}

#[cfg(test)]
pub fn reparent_subject(
    conn: &Connection,
    subject_id: &str,
    new_class_id: &str,
) -> CoreResult<Reparented> {
    let tx = conn.unchecked_transaction()?;
    let moved = reparent_subject_in(&tx, subject_id, new_class_id)?;
    tx.commit()?;
    Ok(moved)
}

pub(crate) fn reparent_subject_in(
    conn: &Connection,
    subject_id: &str,
    new_class_id: &str,
) -> CoreResult<Reparented> {
    let Some(subject) = store::get_subject(conn, subject_id)? else {
        return Err(CoreError::not_found("subject not found"));
    };
    if !store::class_exists(conn, new_class_id)? {
        return Err(CoreError::not_found("target class not found"));
    }
    let moved = Reparented {
        entity_id: subject.id.clone(),
        from_class_id: subject.class_id.clone(),
        to_class_id: new_class_id.to_string(),
    };
    if subject.class_id == new_class_id {
        return Ok(moved);
    }

    conn.execute(
        "UPDATE subjects SET class_id = ? WHERE id = ?",
        (new_class_id, &subject.id),
    )?;
    log::info!(
        "moved subject {} from class {} to {}",
        subject.id,
        moved.from_class_id,
        moved.to_class_id
    );
    Ok(moved)
}
