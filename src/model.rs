use crate::calc::Grade;
use crate::store::Collection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    #[serde(default)]
    pub email: String,
    pub department: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub total_fees: f64,
    #[serde(default)]
    pub fees_paid: f64,
    #[serde(default)]
    pub fees_balance: f64,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub parent_id: String,
}

impl Student {
    /// Balance and status always follow total and paid.
    pub fn normalize_fees(&mut self) {
        self.fees_balance = self.total_fees - self.fees_paid;
        self.payment_status = if self.fees_balance <= 0.0 {
            "Paid".to_string()
        } else {
            "Pending".to_string()
        };
    }

    pub fn field_value(&self, field: StudentField) -> &str {
        match field {
            StudentField::Name => &self.name,
            StudentField::Email => &self.email,
            StudentField::Department => &self.department,
            StudentField::CourseCode => &self.course_code,
        }
    }

    pub fn set_field(&mut self, field: StudentField, raw: &str) -> Result<(), FieldError> {
        let value = field.coerce(raw)?;
        match field {
            StudentField::Name => self.name = value,
            StudentField::Email => self.email = value,
            StudentField::Department => self.department = value,
            StudentField::CourseCode => self.course_code = value,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub department: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    Theory,
    Practical,
    Lab,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    pub department: String,
    pub semester: u32,
    pub credits: f64,
    #[serde(rename = "type")]
    pub kind: SubjectKind,
}

impl Subject {
    /// Credits weight the CGPA, so they must be finite and non-negative.
    pub fn check(&self) -> Result<(), String> {
        if !self.credits.is_finite() || self.credits < 0.0 {
            return Err(format!("credits must be a non-negative number, got {}", self.credits));
        }
        if self.semester == 0 {
            return Err("semester must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    #[serde(default)]
    pub subject_code: String,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub semester: u32,
    pub assessment_type: String,
    pub marks_obtained: f64,
    pub max_marks: u32,
    pub percentage: f64,
    pub grade: Grade,
    #[serde(default)]
    pub academic_year: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub department: String,
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationKind {
    Primary,
    CrossDepartment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAllocation {
    pub id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub department: String,
    pub subject_code: String,
    #[serde(rename = "type")]
    pub kind: AllocationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAllocation {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub advisor_id: String,
    pub advisor_name: String,
    pub department: String,
}

/// Staff-maintained academic record, one per student.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    #[serde(default)]
    pub marks: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<String>,
}

impl StudentRecord {
    pub fn apply(&mut self, update: &AcademicUpdate) {
        match update {
            AcademicUpdate::Marks { subject, value } => {
                self.marks.insert(subject.clone(), *value);
            }
            AcademicUpdate::Attendance(v) => self.attendance = Some(*v),
            AcademicUpdate::Performance(s) => self.performance = Some(s.clone()),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Student attributes editable through the admin lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentField {
    Name,
    Email,
    Department,
    CourseCode,
}

impl StudentField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "department" => Some(Self::Department),
            "courseCode" => Some(Self::CourseCode),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Department => "department",
            Self::CourseCode => "courseCode",
        }
    }

    pub fn coerce(self, raw: &str) -> Result<String, FieldError> {
        let v = raw.trim();
        if v.is_empty() {
            return Err(FieldError::InvalidValue {
                field: self.name(),
                reason: "must not be empty".to_string(),
            });
        }
        if self == Self::Email && !v.contains('@') {
            return Err(FieldError::InvalidValue {
                field: self.name(),
                reason: "must be an email address".to_string(),
            });
        }
        Ok(v.to_string())
    }
}

/// Academic attributes editable through the staff lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcademicField {
    Marks,
    Attendance,
    Performance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcademicUpdate {
    Marks { subject: String, value: f64 },
    Attendance(f64),
    Performance(String),
}

impl AcademicField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "marks" => Some(Self::Marks),
            "attendance" => Some(Self::Attendance),
            "performance" => Some(Self::Performance),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Marks => "marks",
            Self::Attendance => "attendance",
            Self::Performance => "performance",
        }
    }

    pub fn coerce(self, raw: &str) -> Result<AcademicUpdate, FieldError> {
        let invalid = |reason: &str| FieldError::InvalidValue {
            field: self.name(),
            reason: reason.to_string(),
        };
        let raw = raw.trim();
        match self {
            Self::Marks => {
                let Some((subject, value)) = raw.split_once(':') else {
                    return Err(invalid("expected SUBJECT:value"));
                };
                let subject = subject.trim();
                if subject.is_empty() {
                    return Err(invalid("subject must not be empty"));
                }
                let value: f64 = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid("marks must be numeric"))?;
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid("marks must be >= 0"));
                }
                Ok(AcademicUpdate::Marks {
                    subject: subject.to_string(),
                    value,
                })
            }
            Self::Attendance => {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| invalid("attendance must be numeric"))?;
                if !(0.0..=100.0).contains(&value) {
                    return Err(invalid("attendance must be in 0..=100"));
                }
                Ok(AcademicUpdate::Attendance(value))
            }
            Self::Performance => {
                if raw.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                Ok(AcademicUpdate::Performance(raw.to_string()))
            }
        }
    }
}

/// Decodes a raw record into its typed model and re-encodes it, so only
/// well-formed records reach the store.
pub fn normalize_record(collection: Collection, value: Value) -> Result<Value, serde_json::Error> {
    fn roundtrip<T>(value: Value) -> Result<Value, serde_json::Error>
    where
        T: Serialize + serde::de::DeserializeOwned,
    {
        serde_json::to_value(serde_json::from_value::<T>(value)?)
    }

    match collection {
        Collection::Students => {
            let mut s: Student = serde_json::from_value(value)?;
            s.normalize_fees();
            serde_json::to_value(s)
        }
        Collection::Departments => roundtrip::<Department>(value),
        Collection::Staff => roundtrip::<Staff>(value),
        Collection::Subjects => {
            let subject: Subject = serde_json::from_value(value)?;
            subject.check().map_err(<serde_json::Error as serde::de::Error>::custom)?;
            serde_json::to_value(subject)
        }
        Collection::Marks => roundtrip::<Mark>(value),
        Collection::Attendance => roundtrip::<AttendanceRecord>(value),
        Collection::SubjectAllocations => roundtrip::<SubjectAllocation>(value),
        Collection::StudentAllocations => roundtrip::<StudentAllocation>(value),
        Collection::StudentRecords => roundtrip::<StudentRecord>(value),
        Collection::ChangeRequests => roundtrip::<crate::workflow::ChangeRequest>(value),
    }
}
