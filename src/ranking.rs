use crate::calc::{self, Grade};
use crate::db;
use crate::error::{CoreError, CoreResult};
use crate::store;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub const TIE_BREAK_SETTING: &str = "ranking.tieBreak";

/// Order among pupils with equal weighted totals. Ranks are never shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TieBreak {
    #[default]
    Name,
    AdmissionNumber,
}

impl TieBreak {
    pub fn parse(raw: &str) -> Option<TieBreak> {
        match raw.trim() {
            "name" => Some(TieBreak::Name),
            "admissionNumber" => Some(TieBreak::AdmissionNumber),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TieBreak::Name => "name",
            TieBreak::AdmissionNumber => "admissionNumber",
        }
    }
}

/// Workspace tie-break setting; unreadable values fall back to the default.
pub fn load_tie_break(conn: &Connection) -> TieBreak {
    match db::settings_get_json(conn, TIE_BREAK_SETTING) {
        Ok(Some(v)) => v
            .as_str()
            .and_then(TieBreak::parse)
            .unwrap_or_else(|| {
                log::warn!("ignoring invalid {} setting: {}", TIE_BREAK_SETTING, v);
                TieBreak::default()
            }),
        Ok(None) => TieBreak::default(),
        Err(e) => {
            log::warn!("failed to read {}: {:#}", TIE_BREAK_SETTING, e);
            TieBreak::default()
        }
    }
}

pub fn save_tie_break(conn: &Connection, tie_break: TieBreak) -> anyhow::Result<()> {
    db::settings_set_json(
        conn,
        TIE_BREAK_SETTING,
        &serde_json::Value::String(tie_break.as_str().to_string()),
    )?;
    log::info!("ranking tie-break set to {}", tie_break.as_str());
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub pupil_id: String,
    pub name: String,
    pub admission_number: String,
    pub weighted_total: f64,
    pub display_average: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedPupil {
    pub pupil_id: String,
    pub name: String,
    pub admission_number: String,
    pub weighted_total: f64,
    pub average: f64,
    pub grade: Grade,
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRanking {
    pub class_id: String,
    pub term: String,
    pub tie_break: TieBreak,
    pub total_pupils: usize,
    pub rows: Vec<RankedPupil>,
    pub ranks: BTreeMap<String, usize>,
}

impl ClassRanking {
    pub fn rank_of(&self, pupil_id: &str) -> Option<usize> {
        self.ranks.get(pupil_id).copied()
    }
}

fn compare_standings(a: &Standing, b: &Standing, tie_break: TieBreak) -> Ordering {
    b.weighted_total
        .total_cmp(&a.weighted_total)
        .then_with(|| match tie_break {
            TieBreak::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
            TieBreak::AdmissionNumber => a.admission_number.cmp(&b.admission_number),
        })
        .then_with(|| a.pupil_id.cmp(&b.pupil_id))
}

/// Sorts by weighted total descending and numbers the result 1..=N.
pub fn rank(mut standings: Vec<Standing>, tie_break: TieBreak) -> Vec<RankedPupil> {
    standings.sort_by(|a, b| compare_standings(a, b, tie_break));
    standings
        .into_iter()
        .enumerate()
        .map(|(i, s)| RankedPupil {
            pupil_id: s.pupil_id,
            name: s.name,
            admission_number: s.admission_number,
            weighted_total: s.weighted_total,
            average: s.display_average,
            grade: s.grade,
            rank: i + 1,
        })
        .collect()
}

pub fn compute_ranking(conn: &Connection, class_id: &str, term: &str) -> CoreResult<ClassRanking> {
    let term = store::required_text(term, "term")?;
    // Roster, subjects and marks must come from one snapshot.
    let tx = conn.unchecked_transaction()?;
    let ranking = compute_ranking_in(&tx, class_id, &term)?;
    tx.commit()?;
    Ok(ranking)
}

pub(crate) fn compute_ranking_in(
    conn: &Connection,
    class_id: &str,
    term: &str,
) -> CoreResult<ClassRanking> {
    if !store::class_exists(conn, class_id)? {
        return Err(CoreError::not_found("class not found"));
    }
    let tie_break = load_tie_break(conn);
    let pupils = store::list_pupils(conn, Some(class_id), None)?;
    let subjects = store::list_subjects(conn, class_id)?;

    // Only marks whose pupil and subject both sit in this class count.
    let mut stmt = conn.prepare(
        "SELECT m.pupil_id, m.subject_id, m.score
         FROM marks m
         JOIN pupils p ON p.id = m.pupil_id
         JOIN subjects s ON s.id = m.subject_id
         WHERE p.class_id = ?1 AND s.class_id = ?1 AND m.term = ?2",
    )?;
    let mut scores_by_pupil: HashMap<String, HashMap<String, f64>> = HashMap::new();
    let rows = stmt.query_map((class_id, term), |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, f64>(2)?,
        ))
    })?;
    for row in rows {
        let (pupil_id, subject_id, score) = row?;
        scores_by_pupil
            .entry(pupil_id)
            .or_default()
            .insert(subject_id, score);
    }

    let empty = HashMap::new();
    let standings: Vec<Standing> = pupils
        .into_iter()
        .map(|p| {
            let result = calc::aggregate(&subjects, scores_by_pupil.get(&p.id).unwrap_or(&empty));
            Standing {
                pupil_id: p.id,
                name: p.name,
                admission_number: p.admission_number,
                weighted_total: result.weighted_total,
                display_average: result.display_average,
                grade: result.grade,
            }
        })
        .collect();

    let rows = rank(standings, tie_break);
    let ranks = rows
        .iter()
        .map(|r| (r.pupil_id.clone(), r.rank))
        .collect::<BTreeMap<_, _>>();
    log::debug!(
        "ranked {} pupils of class {} for {} over {} subjects",
        rows.len(),
        class_id,
        term,
        subjects.len()
    );

    Ok(ClassRanking {
        class_id: class_id.to_string(),
        term: term.to_string(),
        tie_break,
        total_pupils: rows.len(),
        rows,
        ranks,
    })
}
