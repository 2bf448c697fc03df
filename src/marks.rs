use crate::calc::{grade_for, max_marks_for, round_2_decimals};
use crate::model::{Mark, Student, Subject};
use crate::store::{self, Collection, RecordStore, StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MarkError {
    #[error("marks for {assessment_type} must be a number in 0..={max}, got {value}")]
    OutOfRange {
        assessment_type: String,
        value: f64,
        max: u32,
    },
    #[error("assessment type must not be empty")]
    MissingAssessmentType,
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("subject not found: {0}")]
    SubjectNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MarkError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "invalid_value",
            Self::MissingAssessmentType => "bad_params",
            Self::StudentNotFound(_) | Self::SubjectNotFound(_) => "not_found",
            Self::Store(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assessment {
    pub student_id: String,
    pub subject_id: String,
    pub assessment_type: String,
    pub marks_obtained: f64,
}

fn check_range(assessment_type: &str, value: f64) -> Result<u32, MarkError> {
    if assessment_type.trim().is_empty() {
        return Err(MarkError::MissingAssessmentType);
    }
    let max = max_marks_for(assessment_type);
    if !value.is_finite() || value < 0.0 || value > f64::from(max) {
        return Err(MarkError::OutOfRange {
            assessment_type: assessment_type.to_string(),
            value,
            max,
        });
    }
    Ok(max)
}

fn build_mark(
    student: &Student,
    subject: &Subject,
    assessment_type: &str,
    marks_obtained: f64,
    max_marks: u32,
    academic_year: &str,
) -> Mark {
    let percentage = marks_obtained * 100.0 / f64::from(max_marks);
    Mark {
        id: Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        subject_id: subject.id.clone(),
        subject_code: subject.code.clone(),
        subject_name: subject.name.clone(),
        semester: subject.semester,
        assessment_type: assessment_type.to_string(),
        marks_obtained,
        max_marks,
        percentage: round_2_decimals(percentage),
        grade: grade_for(percentage),
        academic_year: academic_year.to_string(),
    }
}

/// Keyed by (student, subject, assessment); an existing mark keeps its id.
fn upsert_mark(marks: &mut Vec<Mark>, mut mark: Mark) -> Mark {
    match marks.iter_mut().find(|m| {
        m.student_id == mark.student_id
            && m.subject_id == mark.subject_id
            && m.assessment_type == mark.assessment_type
    }) {
        Some(existing) => {
            mark.id = existing.id.clone();
            *existing = mark.clone();
        }
        None => marks.push(mark.clone()),
    }
    mark
}

pub fn record_assessment<S: RecordStore + ?Sized>(
    store: &mut S,
    input: &Assessment,
    academic_year: &str,
) -> Result<Mark, MarkError> {
    let max = check_range(&input.assessment_type, input.marks_obtained)?;

    let students: Vec<Student> = store::load(store, Collection::Students)?;
    let student = students
        .iter()
        .find(|s| s.id == input.student_id)
        .ok_or_else(|| MarkError::StudentNotFound(input.student_id.clone()))?;
    let subjects: Vec<Subject> = store::load(store, Collection::Subjects)?;
    let subject = subjects
        .iter()
        .find(|s| s.id == input.subject_id)
        .ok_or_else(|| MarkError::SubjectNotFound(input.subject_id.clone()))?;

    let mark = build_mark(
        student,
        subject,
        &input.assessment_type,
        input.marks_obtained,
        max,
        academic_year,
    );
    let mut marks: Vec<Mark> = store::load(store, Collection::Marks)?;
    let saved = upsert_mark(&mut marks, mark);
    store::save(store, Collection::Marks, &marks)?;
    tracing::debug!(
        student_id = %saved.student_id,
        subject_id = %saved.subject_id,
        assessment = %saved.assessment_type,
        "mark recorded"
    );
    Ok(saved)
}

#[derive(Debug, Clone)]
pub struct BulkEntry {
    pub student_id: String,
    pub marks_obtained: f64,
}

/// Position of the rejected entry alongside the reason.
#[derive(Debug, Error)]
#[error("entry {index}: {source}")]
pub struct BulkError {
    pub index: usize,
    #[source]
    pub source: MarkError,
}

/// One subject and assessment for many students. Every entry is checked
/// before anything is written; one bad entry rejects the batch.
pub fn record_bulk<S: RecordStore + ?Sized>(
    store: &mut S,
    subject_id: &str,
    assessment_type: &str,
    entries: &[BulkEntry],
    academic_year: &str,
) -> Result<Vec<Mark>, BulkError> {
    let whole = |source: MarkError| BulkError { index: 0, source };

    let subjects: Vec<Subject> = store::load(store, Collection::Subjects).map_err(|e| whole(e.into()))?;
    let subject = subjects
        .iter()
        .find(|s| s.id == subject_id)
        .ok_or_else(|| whole(MarkError::SubjectNotFound(subject_id.to_string())))?;
    let students: Vec<Student> = store::load(store, Collection::Students).map_err(|e| whole(e.into()))?;

    let mut staged = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let max = check_range(assessment_type, entry.marks_obtained)
            .map_err(|source| BulkError { index, source })?;
        let student = students
            .iter()
            .find(|s| s.id == entry.student_id)
            .ok_or_else(|| BulkError {
                index,
                source: MarkError::StudentNotFound(entry.student_id.clone()),
            })?;
        staged.push(build_mark(
            student,
            subject,
            assessment_type,
            entry.marks_obtained,
            max,
            academic_year,
        ));
    }

    let mut marks: Vec<Mark> = store::load(store, Collection::Marks).map_err(|e| whole(e.into()))?;
    let saved: Vec<Mark> = staged
        .into_iter()
        .map(|m| upsert_mark(&mut marks, m))
        .collect();
    store::save(store, Collection::Marks, &marks).map_err(|e| whole(e.into()))?;
    tracing::info!(subject_id, assessment = assessment_type, count = saved.len(), "bulk marks recorded");
    Ok(saved)
}

pub fn list_marks<S: RecordStore + ?Sized>(
    store: &S,
    student_id: Option<&str>,
    subject_id: Option<&str>,
) -> Result<Vec<Mark>, MarkError> {
    let marks: Vec<Mark> = store::load(store, Collection::Marks)?;
    Ok(marks
        .into_iter()
        .filter(|m| student_id.map(|id| m.student_id == id).unwrap_or(true))
        .filter(|m| subject_id.map(|id| m.subject_id == id).unwrap_or(true))
        .collect())
}
