use crate::calc::{self, PupilResult, SubjectLine};
use crate::error::{CoreError, CoreResult};
use crate::ranking;
use crate::store::{self, Pupil, SchoolProfile};
use rusqlite::Connection;
use serde::Serialize;

/// Everything a report card renders for one pupil and term.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub school: Option<SchoolProfile>,
    pub pupil: Pupil,
    pub class_name: String,
    pub term: String,
    pub subjects: Vec<SubjectLine>,
    pub result: PupilResult,
    pub position: usize,
    pub total_pupils: usize,
}

pub fn report_card(conn: &Connection, pupil_id: &str, term: &str) -> CoreResult<ReportCard> {
    let term = store::required_text(term, "term")?;
    let tx = conn.unchecked_transaction()?;

    let Some(pupil) = store::get_pupil(&tx, pupil_id)? else {
        return Err(CoreError::not_found("pupil not found"));
    };
    let Some(class) = store::get_class(&tx, &pupil.class_id)? else {
        return Err(CoreError::not_found("class not found"));
    };
    let school = store::get_school_profile(&tx)?;
    let subjects = store::list_subjects(&tx, &class.id)?;
    let scores = calc::pupil_scores(&tx, &pupil.id, &term)?;
    let ranking = ranking::compute_ranking_in(&tx, &class.id, &term)?;
    tx.commit()?;

    let position = ranking
        .rank_of(&pupil.id)
        .ok_or_else(|| CoreError::not_found("pupil missing from class ranking"))?;

    Ok(ReportCard {
        school,
        class_name: class.name,
        subjects: calc::subject_lines(&subjects, &scores),
        result: calc::aggregate(&subjects, &scores),
        position,
        total_pupils: ranking.total_pupils,
        term,
        pupil,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::Grade;
    use crate::db;
    use crate::marks;
    use crate::store::{NewPupil, SchoolProfilePatch, Sex};

    #[test]
    fn report_card_combines_result_and_position() {
        let conn = db::open_in_memory().expect("db");
        store::upsert_school_profile(
            &conn,
            &SchoolProfilePatch {
                name: Some("Hill School".to_string()),
                academic_year: Some("2025/2026".to_string()),
                term: Some("Term 1".to_string()),
                logo: None,
            },
        )
        .expect("school");
        let class_id = store::create_class(&conn, "Grade 3", 3).expect("class");
        let math = store::create_subject(&conn, &class_id, "Math", 2).expect("math");
        let english = store::create_subject(&conn, &class_id, "English", 1).expect("english");
        let new = |name: &str, adm: &str| NewPupil {
            name: name.to_string(),
            admission_number: adm.to_string(),
            sex: Sex::Male,
            date_of_birth: None,
        };
        let a = store::create_pupil(&conn, &class_id, &new("A", "1")).expect("a");
        let b = store::create_pupil(&conn, &class_id, &new("B", "2")).expect("b");
        marks::record_mark(&conn, &a, &math, "Term 1", 16.0).expect("m");
        marks::record_mark(&conn, &a, &english, "Term 1", 14.0).expect("m");
        marks::record_mark(&conn, &b, &math, "Term 1", 10.0).expect("m");
        marks::record_mark(&conn, &b, &english, "Term 1", 20.0).expect("m");

        let card = report_card(&conn, &b, "Term 1").expect("card");
        assert_eq!(card.class_name, "Grade 3");
        assert_eq!(card.position, 2);
        assert_eq!(card.total_pupils, 2);
        assert_eq!(card.result.grade, Grade::B);
        assert_eq!(card.subjects.len(), 2);
        assert_eq!(card.subjects[0].name, "Math");
        assert_eq!(card.subjects[0].line_total, Some(20.0));
        assert_eq!(
            card.school.as_ref().map(|s| s.name.as_str()),
            Some("Hill School")
        );

        assert!(matches!(
            report_card(&conn, "missing", "Term 1"),
            Err(CoreError::NotFound(_))
        ));
    }
}
