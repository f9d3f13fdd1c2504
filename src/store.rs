use crate::error::{conflict_on_unique, CoreError, CoreResult};
use crate::integrity::{self, Reparented};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolProfile {
    pub name: String,
    pub academic_year: String,
    pub term: String,
    pub logo: Option<String>,
}

/// Fields for creating or patching the school profile. `logo: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct SchoolProfilePatch {
    pub name: Option<String>,
    pub academic_year: Option<String>,
    pub term: Option<String>,
    pub logo: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub level: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassOverview {
    pub id: String,
    pub name: String,
    pub level: i64,
    pub subject_count: i64,
    pub pupil_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub coefficient: i64,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub coefficient: Option<i64>,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }

    pub fn parse(raw: &str) -> Option<Sex> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Sex::Male),
            "female" | "f" => Some(Sex::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pupil {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub admission_number: String,
    pub sex: Sex,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPupil {
    pub name: String,
    pub admission_number: String,
    pub sex: Sex,
    pub date_of_birth: Option<String>,
}

/// `date_of_birth: Some(None)` clears it; `class_id` re-parents.
#[derive(Debug, Clone, Default)]
pub struct PupilPatch {
    pub name: Option<String>,
    pub admission_number: Option<String>,
    pub sex: Option<Sex>,
    pub date_of_birth: Option<Option<String>>,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    pub id: String,
    pub pupil_id: String,
    pub subject_id: String,
    pub term: String,
    pub score: f64,
    pub recorded_at: Option<String>,
}

/// Outcome of an edit that may have moved the entity to another class.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Updated<T> {
    #[serde(flatten)]
    pub entity: T,
    pub reparented: Option<Reparented>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub school: Option<SchoolProfile>,
    pub class_count: i64,
    pub pupil_count: i64,
    pub term: Option<String>,
}

pub(crate) fn required_text(value: &str, field: &str) -> CoreResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(CoreError::validation(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

fn validate_level(level: i64) -> CoreResult<i64> {
    if level <= 0 {
        return Err(CoreError::validation("level must be a positive integer"));
    }
    Ok(level)
}

fn validate_coefficient(coefficient: i64) -> CoreResult<i64> {
    if coefficient <= 0 {
        return Err(CoreError::validation(
            "coefficient must be a positive integer",
        ));
    }
    Ok(coefficient)
}

fn normalize_dob(raw: Option<&str>) -> CoreResult<Option<String>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        CoreError::validation(format!("date of birth must be YYYY-MM-DD, got {}", raw))
    })?;
    Ok(Some(date.format("%Y-%m-%d").to_string()))
}

fn school_from_row(r: &Row<'_>) -> rusqlite::Result<SchoolProfile> {
    Ok(SchoolProfile {
        name: r.get(0)?,
        academic_year: r.get(1)?,
        term: r.get(2)?,
        logo: r.get(3)?,
    })
}

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: r.get(0)?,
        name: r.get(1)?,
        level: r.get(2)?,
    })
}

pub(crate) fn subject_from_row(r: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
        coefficient: r.get(3)?,
    })
}

pub(crate) fn pupil_from_row(r: &Row<'_>) -> rusqlite::Result<Pupil> {
    let raw_sex: String = r.get(4)?;
    let sex = Sex::parse(&raw_sex).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown sex value: {}", raw_sex).into(),
        )
    })?;
    Ok(Pupil {
        id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
        admission_number: r.get(3)?,
        sex,
        date_of_birth: r.get(5)?,
    })
}

pub(crate) fn mark_from_row(r: &Row<'_>) -> rusqlite::Result<Mark> {
    Ok(Mark {
        id: r.get(0)?,
        pupil_id: r.get(1)?,
        subject_id: r.get(2)?,
        term: r.get(3)?,
        score: r.get(4)?,
        recorded_at: r.get(5)?,
    })
}

pub(crate) const SUBJECT_COLUMNS: &str = "id, class_id, name, coefficient";
pub(crate) const PUPIL_COLUMNS: &str =
    "id, class_id, name, admission_number, sex, date_of_birth";
pub(crate) const MARK_COLUMNS: &str = "id, pupil_id, subject_id, term, score, recorded_at";

// --- school profile ---

pub fn get_school_profile(conn: &Connection) -> CoreResult<Option<SchoolProfile>> {
    Ok(conn
        .query_row(
            "SELECT name, academic_year, term, logo FROM school_profile WHERE id = 1",
            [],
            school_from_row,
        )
        .optional()?)
}

fn write_school_profile(conn: &Connection, profile: &SchoolProfile) -> CoreResult<()> {
    conn.execute(
        "INSERT INTO school_profile(id, name, academic_year, term, logo, updated_at)
         VALUES(1, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           academic_year = excluded.academic_year,
           term = excluded.term,
           logo = excluded.logo,
           updated_at = excluded.updated_at",
        (
            &profile.name,
            &profile.academic_year,
            &profile.term,
            &profile.logo,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

fn profile_from_patch(patch: &SchoolProfilePatch) -> CoreResult<SchoolProfile> {
    Ok(SchoolProfile {
        name: required_text(patch.name.as_deref().unwrap_or(""), "name")?,
        academic_year: required_text(
            patch.academic_year.as_deref().unwrap_or(""),
            "academicYear",
        )?,
        term: required_text(patch.term.as_deref().unwrap_or(""), "term")?,
        logo: patch.logo.clone().flatten(),
    })
}

/// Creates the profile; a second creation is a conflict.
pub fn create_school_profile(
    conn: &Connection,
    patch: &SchoolProfilePatch,
) -> CoreResult<SchoolProfile> {
    let profile = profile_from_patch(patch)?;
    let tx = conn.unchecked_transaction()?;
    if get_school_profile(&tx)?.is_some() {
        return Err(CoreError::conflict("school profile already exists"));
    }
    write_school_profile(&tx, &profile)?;
    tx.commit()?;
    log::info!("created school profile {}", profile.name);
    Ok(profile)
}

/// Creates the profile if absent, otherwise patches the supplied fields in place.
pub fn upsert_school_profile(
    conn: &Connection,
    patch: &SchoolProfilePatch,
) -> CoreResult<SchoolProfile> {
    let tx = conn.unchecked_transaction()?;
    let profile = match get_school_profile(&tx)? {
        None => profile_from_patch(patch)?,
        Some(mut current) => {
            if let Some(name) = &patch.name {
                current.name = required_text(name, "name")?;
            }
            if let Some(year) = &patch.academic_year {
                current.academic_year = required_text(year, "academicYear")?;
            }
            if let Some(term) = &patch.term {
                current.term = required_text(term, "term")?;
            }
            if let Some(logo) = &patch.logo {
                current.logo = logo.clone();
            }
            current
        }
    };
    write_school_profile(&tx, &profile)?;
    tx.commit()?;
    log::info!("saved school profile {}", profile.name);
    Ok(profile)
}

// --- classes ---

pub fn create_class(conn: &Connection, name: &str, level: i64) -> CoreResult<String> {
    let name = required_text(name, "name")?;
    let level = validate_level(level)?;
    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, level) VALUES(?, ?, ?)",
        (&class_id, &name, level),
    )?;
    log::info!("created class {} ({}) level {}", class_id, name, level);
    Ok(class_id)
}

pub fn update_class(
    conn: &Connection,
    class_id: &str,
    name: Option<&str>,
    level: Option<i64>,
) -> CoreResult<Class> {
    let name = name.map(|n| required_text(n, "name")).transpose()?;
    let level = level.map(validate_level).transpose()?;

    let tx = conn.unchecked_transaction()?;
    let Some(mut class) = get_class(&tx, class_id)? else {
        return Err(CoreError::not_found("class not found"));
    };
    if let Some(name) = name {
        class.name = name;
    }
    if let Some(level) = level {
        class.level = level;
    }
    tx.execute(
        "UPDATE classes SET name = ?, level = ? WHERE id = ?",
        (&class.name, class.level, &class.id),
    )?;
    tx.commit()?;
    Ok(class)
}

pub fn get_class(conn: &Connection, class_id: &str) -> CoreResult<Option<Class>> {
    Ok(conn
        .query_row(
            "SELECT id, name, level FROM classes WHERE id = ?",
            [class_id],
            class_from_row,
        )
        .optional()?)
}

pub(crate) fn class_exists(conn: &Connection, class_id: &str) -> CoreResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Classes in canonical order: level ascending, then name.
pub fn list_classes(conn: &Connection) -> CoreResult<Vec<ClassOverview>> {
    // Correlated subqueries avoid double-counting from joins.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.level,
           (SELECT COUNT(*) FROM subjects s WHERE s.class_id = c.id) AS subject_count,
           (SELECT COUNT(*) FROM pupils p WHERE p.class_id = c.id) AS pupil_count
         FROM classes c
         ORDER BY c.level, c.name, c.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassOverview {
                id: r.get(0)?,
                name: r.get(1)?,
                level: r.get(2)?,
                subject_count: r.get(3)?,
                pupil_count: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- subjects ---

pub fn create_subject(
    conn: &Connection,
    class_id: &str,
    name: &str,
    coefficient: i64,
) -> CoreResult<String> {
    let name = required_text(name, "name")?;
    let coefficient = validate_coefficient(coefficient)?;

    let tx = conn.unchecked_transaction()?;
    if !class_exists(&tx, class_id)? {
        return Err(CoreError::not_found("class not found"));
    }
    let subject_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO subjects(id, class_id, name, coefficient) VALUES(?, ?, ?, ?)",
        (&subject_id, class_id, &name, coefficient),
    )?;
    tx.commit()?;
    log::info!(
        "created subject {} ({}, coefficient {}) in class {}",
        subject_id,
        name,
        coefficient,
        class_id
    );
    Ok(subject_id)
}

pub fn update_subject(
    conn: &Connection,
    subject_id: &str,
    patch: &SubjectPatch,
) -> CoreResult<Updated<Subject>> {
    let name = patch
        .name
        .as_deref()
        .map(|n| required_text(n, "name"))
        .transpose()?;
    let coefficient = patch.coefficient.map(validate_coefficient).transpose()?;

    let tx = conn.unchecked_transaction()?;
    let Some(mut subject) = get_subject(&tx, subject_id)? else {
        return Err(CoreError::not_found("subject not found"));
    };
    if let Some(name) = name {
        subject.name = name;
    }
    if let Some(coefficient) = coefficient {
        subject.coefficient = coefficient;
    }
    tx.execute(
        "UPDATE subjects SET name = ?, coefficient = ? WHERE id = ?",
        (&subject.name, subject.coefficient, &subject.id),
    )?;

    let reparented = match patch.class_id.as_deref() {
        Some(target) if target != subject.class_id => {
            let moved = integrity::reparent_subject_in(&tx, &subject.id, target)?;
            subject.class_id = moved.to_class_id.clone();
            Some(moved)
        }
        _ => None,
    };
    tx.commit()?;
    Ok(Updated {
        entity: subject,
        reparented,
    })
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> CoreResult<Option<Subject>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM subjects WHERE id = ?", SUBJECT_COLUMNS),
            [subject_id],
            subject_from_row,
        )
        .optional()?)
}

/// Subjects of a class in creation order.
pub fn list_subjects(conn: &Connection, class_id: &str) -> CoreResult<Vec<Subject>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM subjects WHERE class_id = ? ORDER BY rowid",
        SUBJECT_COLUMNS
    ))?;
    let rows = stmt
        .query_map([class_id], subject_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// --- pupils ---

pub fn create_pupil(conn: &Connection, class_id: &str, pupil: &NewPupil) -> CoreResult<String> {
    let name = required_text(&pupil.name, "name")?;
    let admission_number = required_text(&pupil.admission_number, "admissionNumber")?;
    let dob = normalize_dob(pupil.date_of_birth.as_deref())?;

    let tx = conn.unchecked_transaction()?;
    if !class_exists(&tx, class_id)? {
        return Err(CoreError::not_found("class not found"));
    }
    let pupil_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO pupils(id, class_id, name, admission_number, sex, date_of_birth)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &pupil_id,
            class_id,
            &name,
            &admission_number,
            pupil.sex.as_str(),
            &dob,
        ),
    )
    .map_err(|e| {
        conflict_on_unique(e, "admission number already used in this class")
    })?;
    tx.commit()?;
    log::info!("created pupil {} ({}) in class {}", pupil_id, name, class_id);
    Ok(pupil_id)
}

pub fn update_pupil(
    conn: &Connection,
    pupil_id: &str,
    patch: &PupilPatch,
) -> CoreResult<Updated<Pupil>> {
    let name = patch
        .name
        .as_deref()
        .map(|n| required_text(n, "name"))
        .transpose()?;
    let admission_number = patch
        .admission_number
        .as_deref()
        .map(|n| required_text(n, "admissionNumber"))
        .transpose()?;
    let dob = patch
        .date_of_birth
        .as_ref()
        .map(|d| normalize_dob(d.as_deref()))
        .transpose()?;

    let tx = conn.unchecked_transaction()?;
    let Some(mut pupil) = get_pupil(&tx, pupil_id)? else {
        return Err(CoreError::not_found("pupil not found"));
    };
    if let Some(name) = name {
        pupil.name = name;
    }
    if let Some(admission_number) = admission_number {
        pupil.admission_number = admission_number;
    }
    if let Some(sex) = patch.sex {
        pupil.sex = sex;
    }
    if let Some(dob) = dob {
        pupil.date_of_birth = dob;
    }
    let target = patch
        .class_id
        .as_deref()
        .filter(|target| *target != pupil.class_id);

    // When moving, the admission number is written with the class so the
    // uniqueness check sees the final (class, number) pair.
    let reparented = match target {
        Some(target) => {
            tx.execute(
                "UPDATE pupils SET name = ?, sex = ?, date_of_birth = ? WHERE id = ?",
                (&pupil.name, pupil.sex.as_str(), &pupil.date_of_birth, &pupil.id),
            )?;
            let moved = integrity::reparent_pupil_in(
                &tx,
                &pupil.id,
                target,
                Some(pupil.admission_number.as_str()),
            )?;
            pupil.class_id = moved.to_class_id.clone();
            Some(moved)
        }
        None => {
            tx.execute(
                "UPDATE pupils SET name = ?, admission_number = ?, sex = ?, date_of_birth = ?
                 WHERE id = ?",
                (
                    &pupil.name,
                    &pupil.admission_number,
                    pupil.sex.as_str(),
                    &pupil.date_of_birth,
                    &pupil.id,
                ),
            )
            .map_err(|e| {
                conflict_on_unique(e, "admission number already used in this class")
            })?;
            None
        }
    };
    tx.commit()?;
    Ok(Updated {
        entity: pupil,
        reparented,
    })
}

pub fn get_pupil(conn: &Connection, pupil_id: &str) -> CoreResult<Option<Pupil>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM pupils WHERE id = ?", PUPIL_COLUMNS),
            [pupil_id],
            pupil_from_row,
        )
        .optional()?)
}

/// Pupils by name; `search` matches name or admission number, case-insensitively.
pub fn list_pupils(
    conn: &Connection,
    class_id: Option<&str>,
    search: Option<&str>,
) -> CoreResult<Vec<Pupil>> {
    let pupils = match class_id {
        Some(class_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM pupils WHERE class_id = ? ORDER BY name COLLATE NOCASE, id",
                PUPIL_COLUMNS
            ))?;
            let rows = stmt
                .query_map([class_id], pupil_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM pupils ORDER BY name COLLATE NOCASE, id",
                PUPIL_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], pupil_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };

    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let Some(needle) = needle else {
        return Ok(pupils);
    };
    Ok(pupils
        .into_iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.admission_number.to_lowercase().contains(&needle)
        })
        .collect())
}

// --- marks (reads) ---

pub fn get_mark(conn: &Connection, mark_id: &str) -> CoreResult<Option<Mark>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM marks WHERE id = ?", MARK_COLUMNS),
            [mark_id],
            mark_from_row,
        )
        .optional()?)
}

pub fn list_marks_for_pupil(conn: &Connection, pupil_id: &str, term: &str) -> CoreResult<Vec<Mark>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM marks WHERE pupil_id = ? AND term = ? ORDER BY rowid",
        MARK_COLUMNS
    ))?;
    let rows = stmt
        .query_map((pupil_id, term), mark_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn dashboard_summary(conn: &Connection) -> CoreResult<DashboardSummary> {
    let school = get_school_profile(conn)?;
    let class_count: i64 = conn.query_row("SELECT COUNT(*) FROM classes", [], |r| r.get(0))?;
    let pupil_count: i64 = conn.query_row("SELECT COUNT(*) FROM pupils", [], |r| r.get(0))?;
    let term = school.as_ref().map(|s| s.term.clone());
    Ok(DashboardSummary {
        school,
        class_count,
        pupil_count,
        term,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn pupil(name: &str, adm: &str) -> NewPupil {
        NewPupil {
            name: name.to_string(),
            admission_number: adm.to_string(),
            sex: Sex::Female,
            date_of_birth: None,
        }
    }

    #[test]
    fn create_class_validates_name_and_level() {
        let conn = db::open_in_memory().expect("db");
        assert!(matches!(
            create_class(&conn, "  ", 1),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            create_class(&conn, "Grade 1", 0),
            Err(CoreError::Validation(_))
        ));
        let id = create_class(&conn, " Grade 1 ", 1).expect("create");
        assert_eq!(get_class(&conn, &id).expect("get").expect("class").name, "Grade 1");
    }

    #[test]
    fn classes_list_by_level_then_name() {
        let conn = db::open_in_memory().expect("db");
        create_class(&conn, "Grade 3", 3).expect("c3");
        create_class(&conn, "Grade 1B", 1).expect("c1b");
        create_class(&conn, "Grade 1A", 1).expect("c1a");
        let names: Vec<String> = list_classes(&conn)
            .expect("list")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Grade 1A", "Grade 1B", "Grade 3"]);
    }

    #[test]
    fn subject_requires_existing_class_and_positive_coefficient() {
        let conn = db::open_in_memory().expect("db");
        assert!(matches!(
            create_subject(&conn, "missing", "Math", 2),
            Err(CoreError::NotFound(_))
        ));
        let class_id = create_class(&conn, "Grade 3", 3).expect("class");
        assert!(matches!(
            create_subject(&conn, &class_id, "Math", 0),
            Err(CoreError::Validation(_))
        ));
        let id = create_subject(&conn, &class_id, "Math", 2).expect("subject");
        let subject = get_subject(&conn, &id).expect("get").expect("subject");
        assert_eq!(subject.coefficient, 2);
        assert_eq!(subject.class_id, class_id);
    }

    #[test]
    fn pupil_validation_and_admission_conflicts() {
        let conn = db::open_in_memory().expect("db");
        let a = create_class(&conn, "A", 1).expect("a");
        let b = create_class(&conn, "B", 2).expect("b");
        assert!(matches!(
            create_pupil(&conn, "nope", &pupil("Ann", "001")),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            create_pupil(&conn, &a, &pupil("", "001")),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            create_pupil(&conn, &a, &pupil("Ann", " ")),
            Err(CoreError::Validation(_))
        ));
        let mut bad_dob = pupil("Ann", "001");
        bad_dob.date_of_birth = Some("31/12/2015".to_string());
        assert!(matches!(
            create_pupil(&conn, &a, &bad_dob),
            Err(CoreError::Validation(_))
        ));

        create_pupil(&conn, &a, &pupil("Ann", "001")).expect("ann");
        assert!(matches!(
            create_pupil(&conn, &a, &pupil("Ben", "001")),
            Err(CoreError::Conflict(_))
        ));
        create_pupil(&conn, &b, &pupil("Ben", "001")).expect("same number, other class");
    }

    #[test]
    fn update_pupil_moves_class_and_reports_affected() {
        let conn = db::open_in_memory().expect("db");
        let a = create_class(&conn, "A", 1).expect("a");
        let b = create_class(&conn, "B", 2).expect("b");
        let id = create_pupil(&conn, &a, &pupil("Ann", "001")).expect("ann");

        let updated = update_pupil(
            &conn,
            &id,
            &PupilPatch {
                name: Some("Ann Marie".to_string()),
                class_id: Some(b.clone()),
                ..PupilPatch::default()
            },
        )
        .expect("update");
        assert_eq!(updated.entity.class_id, b);
        assert_eq!(updated.entity.name, "Ann Marie");
        let moved = updated.reparented.expect("reparented");
        assert_eq!(moved.from_class_id, a);
        assert_eq!(moved.to_class_id, b);
        assert_eq!(get_pupil(&conn, &id).expect("get").expect("pupil").class_id, b);
    }

    #[test]
    fn moving_pupil_checks_admission_number_in_target_class() {
        let conn = db::open_in_memory().expect("db");
        let a = create_class(&conn, "A", 1).expect("a");
        let b = create_class(&conn, "B", 1).expect("b");
        let p = create_pupil(&conn, &a, &pupil("Pat", "1")).expect("pat");
        create_pupil(&conn, &a, &pupil("Quin", "2")).expect("quin");

        // "2" is taken in A but free in B.
        let updated = update_pupil(
            &conn,
            &p,
            &PupilPatch {
                admission_number: Some("2".to_string()),
                class_id: Some(b.clone()),
                ..PupilPatch::default()
            },
        )
        .expect("move and renumber");
        assert_eq!(updated.entity.class_id, b);
        assert_eq!(updated.entity.admission_number, "2");
        let stored = get_pupil(&conn, &p).expect("get").expect("pupil");
        assert_eq!(stored.class_id, b);
        assert_eq!(stored.admission_number, "2");

        // Moving back into A with "2" still clashes with Quin, and nothing changes.
        let res = update_pupil(
            &conn,
            &p,
            &PupilPatch {
                name: Some("Renamed".to_string()),
                class_id: Some(a.clone()),
                ..PupilPatch::default()
            },
        );
        assert!(matches!(res, Err(CoreError::Conflict(_))));
        let stored = get_pupil(&conn, &p).expect("get").expect("pupil");
        assert_eq!(stored.class_id, b);
        assert_eq!(stored.name, "Pat");

        // Renumbering away from the clash makes the same move valid.
        update_pupil(
            &conn,
            &p,
            &PupilPatch {
                admission_number: Some("3".to_string()),
                class_id: Some(a.clone()),
                ..PupilPatch::default()
            },
        )
        .expect("move back with new number");
    }

    #[test]
    fn unknown_sex_value_is_a_read_error() {
        let conn = db::open_in_memory().expect("db");
        let a = create_class(&conn, "A", 1).expect("a");
        conn.execute_batch("PRAGMA ignore_check_constraints = ON")
            .expect("pragma");
        conn.execute(
            "INSERT INTO pupils(id, class_id, name, admission_number, sex)
             VALUES('odd', ?, 'Odd', '9', 'Unknown')",
            [&a],
        )
        .expect("insert");
        assert!(matches!(get_pupil(&conn, "odd"), Err(CoreError::Db(_))));
    }

    #[test]
    fn failed_update_leaves_pupil_untouched() {
        let conn = db::open_in_memory().expect("db");
        let a = create_class(&conn, "A", 1).expect("a");
        let id = create_pupil(&conn, &a, &pupil("Ann", "001")).expect("ann");
        let res = update_pupil(
            &conn,
            &id,
            &PupilPatch {
                name: Some("Changed".to_string()),
                class_id: Some("missing".to_string()),
                ..PupilPatch::default()
            },
        );
        assert!(matches!(res, Err(CoreError::NotFound(_))));
        assert_eq!(get_pupil(&conn, &id).expect("get").expect("pupil").name, "Ann");
    }

    #[test]
    fn list_pupils_searches_name_and_admission_number() {
        let conn = db::open_in_memory().expect("db");
        let a = create_class(&conn, "A", 1).expect("a");
        create_pupil(&conn, &a, &pupil("Zoe", "ADM-7")).expect("zoe");
        create_pupil(&conn, &a, &pupil("adam", "X1")).expect("adam");
        let all: Vec<String> = list_pupils(&conn, Some(&a), None)
            .expect("list")
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(all, vec!["adam", "Zoe"]);
        let by_adm = list_pupils(&conn, None, Some("adm")).expect("search");
        assert_eq!(by_adm.len(), 2);
        let by_number = list_pupils(&conn, None, Some("x1")).expect("search");
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].name, "adam");
    }

    #[test]
    fn school_profile_is_a_single_slot() {
        let conn = db::open_in_memory().expect("db");
        assert!(matches!(
            upsert_school_profile(
                &conn,
                &SchoolProfilePatch {
                    name: Some("Hill School".to_string()),
                    ..SchoolProfilePatch::default()
                }
            ),
            Err(CoreError::Validation(_))
        ));

        let full = SchoolProfilePatch {
            name: Some("Hill School".to_string()),
            academic_year: Some("2025/2026".to_string()),
            term: Some("Term 1".to_string()),
            logo: None,
        };
        create_school_profile(&conn, &full).expect("create");
        assert!(matches!(
            create_school_profile(&conn, &full),
            Err(CoreError::Conflict(_))
        ));

        let patched = upsert_school_profile(
            &conn,
            &SchoolProfilePatch {
                term: Some("Term 2".to_string()),
                logo: Some(Some("data:image/png;base64,AAAA".to_string())),
                ..SchoolProfilePatch::default()
            },
        )
        .expect("patch");
        assert_eq!(patched.name, "Hill School");
        assert_eq!(patched.term, "Term 2");
        assert!(patched.logo.is_some());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM school_profile", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn dashboard_counts_classes_and_pupils() {
        let conn = db::open_in_memory().expect("db");
        let a = create_class(&conn, "A", 1).expect("a");
        create_pupil(&conn, &a, &pupil("Ann", "001")).expect("ann");
        create_pupil(&conn, &a, &pupil("Ben", "002")).expect("ben");
        let summary = dashboard_summary(&conn).expect("summary");
        assert_eq!(summary.class_count, 1);
        assert_eq!(summary.pupil_count, 2);
        assert!(summary.school.is_none());
        assert!(summary.term.is_none());
    }
}
