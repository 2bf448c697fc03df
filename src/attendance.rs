use crate::model::{AttendanceRecord, AttendanceStatus, Student};
use crate::store::{self, Collection, RecordStore, StoreError};
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("date must be YYYY-MM-DD: {0}")]
    BadDate(String),
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("student {0} is listed more than once for the day")]
    DuplicateStudent(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AttendanceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadDate(_) | Self::DuplicateStudent(_) => "bad_params",
            Self::StudentNotFound(_) => "not_found",
            Self::Store(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
}

/// Marks one day for many students. A student has at most one record per
/// date; re-marking overwrites the status. Unknown or repeated students
/// reject the batch.
pub fn mark_day<S: RecordStore + ?Sized>(
    store: &mut S,
    date: &str,
    entries: &[AttendanceEntry],
) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| AttendanceError::BadDate(date.to_string()))?;
    let date = day.format("%Y-%m-%d").to_string();

    let students: Vec<Student> = store::load(store, Collection::Students)?;
    let mut staged = Vec::with_capacity(entries.len());
    for (i, e) in entries.iter().enumerate() {
        if entries[..i].iter().any(|prev| prev.student_id == e.student_id) {
            return Err(AttendanceError::DuplicateStudent(e.student_id.clone()));
        }
        let student = students
            .iter()
            .find(|s| s.id == e.student_id)
            .ok_or_else(|| AttendanceError::StudentNotFound(e.student_id.clone()))?;
        staged.push(AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            roll_number: student.roll_number.clone(),
            department: student.department.clone(),
            date: date.clone(),
            status: e.status,
        });
    }

    let mut records: Vec<AttendanceRecord> = store::load(store, Collection::Attendance)?;
    for rec in &mut staged {
        match records
            .iter_mut()
            .find(|r| r.student_id == rec.student_id && r.date == rec.date)
        {
            Some(existing) => {
                rec.id = existing.id.clone();
                *existing = rec.clone();
            }
            None => records.push(rec.clone()),
        }
    }
    store::save(store, Collection::Attendance, &records)?;
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn remarking_a_day_overwrites_status() {
        let mut store = MemoryStore::new();
        crate::seed::seed_sample_data(&mut store, 2).expect("seed");
        let entry = |id: &str, status| AttendanceEntry {
            student_id: id.into(),
            status,
        };

        mark_day(
            &mut store,
            "2024-07-01",
            &[entry("1000", AttendanceStatus::Present), entry("1001", AttendanceStatus::Absent)],
        )
        .expect("first");
        mark_day(&mut store, "2024-07-01", &[entry("1001", AttendanceStatus::Present)]).expect("second");

        let all: Vec<AttendanceRecord> = store::load(&store, Collection::Attendance).expect("load");
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.status == AttendanceStatus::Present));
        assert_eq!(all[0].roll_number, "MCA001");
    }

    #[test]
    fn rejects_bad_dates_and_unknown_students() {
        let mut store = MemoryStore::new();
        crate::seed::seed_sample_data(&mut store, 1).expect("seed");
        let present = AttendanceEntry {
            student_id: "1000".into(),
            status: AttendanceStatus::Present,
        };
        assert_eq!(
            mark_day(&mut store, "01/07/2024", &[present.clone()]).unwrap_err().code(),
            "bad_params"
        );
        let ghost = AttendanceEntry {
            student_id: "ghost".into(),
            status: AttendanceStatus::Absent,
        };
        assert_eq!(
            mark_day(&mut store, "2024-07-01", &[present, ghost]).unwrap_err().code(),
            "not_found"
        );
        assert!(store.get("attendance").expect("get").is_empty());
    }

    #[test]
    fn repeated_student_in_one_batch_is_rejected() {
        let mut store = MemoryStore::new();
        crate::seed::seed_sample_data(&mut store, 1).expect("seed");
        let entry = |status| AttendanceEntry {
            student_id: "1000".into(),
            status,
        };
        let err = mark_day(
            &mut store,
            "2024-07-01",
            &[entry(AttendanceStatus::Present), entry(AttendanceStatus::Absent)],
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        assert!(store.get("attendance").expect("get").is_empty());
    }
}
