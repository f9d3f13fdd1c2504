use crate::error::{CoreError, CoreResult};
use crate::store::{self, Subject};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    F,
}

/// Lower bound of each band, highest first. Anything below the last is `F`.
const GRADE_BANDS: [(f64, Grade); 5] = [
    (18.0, Grade::APlus),
    (16.0, Grade::A),
    (14.0, Grade::BPlus),
    (12.0, Grade::B),
    (10.0, Grade::C),
];

impl Grade {
    pub fn from_average(average: f64) -> Grade {
        GRADE_BANDS
            .iter()
            .find(|(min, _)| average >= *min)
            .map(|(_, g)| *g)
            .unwrap_or(Grade::F)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
        }
    }

    pub fn remark(self) -> &'static str {
        match self {
            Grade::APlus => "Excellent",
            Grade::A => "Very Good",
            Grade::BPlus => "Good",
            Grade::B => "Fair",
            Grade::C => "Pass",
            Grade::F => "Needs Improvement",
        }
    }
}

/// Half-away-from-zero rounding to 2 decimals, as shown on report cards.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PupilResult {
    pub weighted_total: f64,
    pub coefficient_sum: i64,
    /// Full precision.
    pub average: f64,
    pub display_average: f64,
    pub grade: Grade,
    pub remark: &'static str,
    pub subject_count: usize,
    /// Subjects without a mark; they count as 0 but keep their coefficient.
    pub missing_subjects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject_id: String,
    pub name: String,
    pub coefficient: i64,
    pub score: Option<f64>,
    pub line_total: Option<f64>,
}

/// Weighted result of one pupil over `subjects`. `scores` is keyed by subject id;
/// entries for subjects outside the set are ignored.
pub fn aggregate(subjects: &[Subject], scores: &HashMap<String, f64>) -> PupilResult {
    let mut weighted_total = 0.0_f64;
    let mut coefficient_sum = 0_i64;
    let mut missing_subjects = 0_usize;

    for s in subjects {
        match scores.get(&s.id) {
            Some(score) => weighted_total += score * s.coefficient as f64,
            None => missing_subjects += 1,
        }
        coefficient_sum += s.coefficient;
    }

    let average = if coefficient_sum > 0 {
        weighted_total / coefficient_sum as f64
    } else {
        0.0
    };
    // Bands compare the full-precision average; rounding is for display only.
    let grade = Grade::from_average(average);

    PupilResult {
        weighted_total,
        coefficient_sum,
        average,
        display_average: round_2_decimals(average),
        grade,
        remark: grade.remark(),
        subject_count: subjects.len(),
        missing_subjects,
    }
}

pub fn subject_lines(subjects: &[Subject], scores: &HashMap<String, f64>) -> Vec<SubjectLine> {
    subjects
        .iter()
        .map(|s| {
            let score = scores.get(&s.id).copied();
            SubjectLine {
                subject_id: s.id.clone(),
                name: s.name.clone(),
                coefficient: s.coefficient,
                score,
                line_total: score.map(|v| v * s.coefficient as f64),
            }
        })
        .collect()
}

/// Scores of one pupil for `term`, keyed by subject id.
pub(crate) fn pupil_scores(
    conn: &Connection,
    pupil_id: &str,
    term: &str,
) -> CoreResult<HashMap<String, f64>> {
    Ok(store::list_marks_for_pupil(conn, pupil_id, term)?
        .into_iter()
        .map(|m| (m.subject_id, m.score))
        .collect())
}

pub fn compute_result(conn: &Connection, pupil_id: &str, term: &str) -> CoreResult<PupilResult> {
    let term = store::required_text(term, "term")?;
    // One read transaction: subjects and marks come from the same snapshot.
    let tx = conn.unchecked_transaction()?;
    let Some(pupil) = store::get_pupil(&tx, pupil_id)? else {
        return Err(CoreError::not_found("pupil not found"));
    };
    let subjects = store::list_subjects(&tx, &pupil.class_id)?;
    let scores = pupil_scores(&tx, &pupil.id, &term)?;
    tx.commit()?;

    let result = aggregate(&subjects, &scores);
    log::debug!(
        "result for pupil {} ({}): total {} over {} => {}",
        pupil.id,
        term,
        result.weighted_total,
        result.coefficient_sum,
        result.grade.as_str()
    );
    Ok(result)
}
