use crate::calc::{attendance_percentage, semester_performance};
use crate::model::{AttendanceRecord, AttendanceStatus, Mark, Student, StudentRecord, Subject};
use crate::store::{self, Collection, RecordStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StudentNotFound(_) => "not_found",
            Self::Store(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub college_name: String,
    pub currency_symbol: String,
    pub include_fees: bool,
    pub max_semester: u32,
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn push_row(out: &mut String, cells: &[&str]) {
    let line: Vec<String> = cells.iter().map(|c| csv_quote(c)).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn money(symbol: &str, amount: f64) -> String {
    format!("{}{:.0}", symbol, amount)
}

/// Student report as CSV text: identity, per-semester results, attendance,
/// the staff-maintained record and (optionally) fees.
pub fn student_report_csv<S: RecordStore + ?Sized>(
    store: &S,
    student_id: &str,
    opts: &ReportOptions,
) -> Result<String, ReportError> {
    let students: Vec<Student> = store::load(store, Collection::Students)?;
    let student = students
        .iter()
        .find(|s| s.id == student_id)
        .ok_or_else(|| ReportError::StudentNotFound(student_id.to_string()))?;
    let subjects: Vec<Subject> = store::load(store, Collection::Subjects)?;
    let marks: Vec<Mark> = store::load(store, Collection::Marks)?;
    let attendance: Vec<AttendanceRecord> = store::load(store, Collection::Attendance)?;
    let records: Vec<StudentRecord> = store::load(store, Collection::StudentRecords)?;

    let mut out = String::new();
    push_row(&mut out, &[&format!("{} - Student Report", opts.college_name)]);
    push_row(&mut out, &[""]);
    push_row(&mut out, &["Student Information"]);
    push_row(&mut out, &["Name", &student.name]);
    push_row(&mut out, &["Roll Number", &student.roll_number]);
    push_row(&mut out, &["Department", &student.department]);
    push_row(&mut out, &["Course Code", &student.course_code]);
    push_row(&mut out, &[""]);

    push_row(&mut out, &["Academic Performance"]);
    push_row(
        &mut out,
        &["Semester", "Subject Code", "Subject", "Credits", "Total", "Percentage", "Grade"],
    );
    for semester in 1..=opts.max_semester {
        let perf = semester_performance(student, &subjects, &marks, semester);
        if perf.subjects.is_empty() {
            continue;
        }
        let sem = semester.to_string();
        for s in &perf.subjects {
            push_row(
                &mut out,
                &[
                    &sem,
                    &s.subject_code,
                    &s.subject_name,
                    &s.credits.to_string(),
                    &s.total.to_string(),
                    &format!("{:.2}", s.percentage),
                    s.grade.label(),
                ],
            );
        }
        push_row(
            &mut out,
            &[
                &sem,
                "",
                "Semester Total",
                "",
                &perf.total_marks.to_string(),
                &format!("{:.2}", perf.percentage),
                perf.grade.label(),
            ],
        );
        push_row(&mut out, &[&sem, "", "CGPA", "", &format!("{:.2}", perf.cgpa), "", ""]);
    }

    let own: Vec<&AttendanceRecord> = attendance
        .iter()
        .filter(|a| a.student_id == student.id)
        .collect();
    let present = own
        .iter()
        .filter(|a| a.status == AttendanceStatus::Present)
        .count() as u32;
    push_row(
        &mut out,
        &[
            "Attendance",
            &format!("{}%", attendance_percentage(present, own.len() as u32)),
        ],
    );

    let record = records.iter().find(|r| r.student_id == student.id);
    push_row(&mut out, &["Staff Marks", &staff_marks_cell(record)]);
    push_row(
        &mut out,
        &[
            "Performance",
            record
                .and_then(|r| r.performance.as_deref())
                .unwrap_or("N/A"),
        ],
    );

    if opts.include_fees {
        push_row(&mut out, &[""]);
        push_row(&mut out, &["Fees Information"]);
        let sym = &opts.currency_symbol;
        push_row(&mut out, &["Total Fees", &money(sym, student.total_fees)]);
        push_row(&mut out, &["Fees Paid", &money(sym, student.fees_paid)]);
        push_row(&mut out, &["Balance", &money(sym, student.fees_balance)]);
        push_row(&mut out, &["Payment Status", &student.payment_status]);
    }

    Ok(out)
}

/// `SUBJ:mark; ...` from the staff-maintained record, or `N/A`.
fn staff_marks_cell(record: Option<&StudentRecord>) -> String {
    record
        .filter(|r| !r.marks.is_empty())
        .map(|r| {
            r.marks
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_else(|| "N/A".to_string())
}

/// One row per student, from the staff-maintained records. Students keep
/// store order; `department` narrows the roster to one department.
pub fn roster_csv<S: RecordStore + ?Sized>(
    store: &S,
    department: Option<&str>,
    opts: &ReportOptions,
) -> Result<String, ReportError> {
    let students: Vec<Student> = store::load(store, Collection::Students)?;
    let records: Vec<StudentRecord> = store::load(store, Collection::StudentRecords)?;

    let mut header = vec![
        "Student Name",
        "Roll Number",
        "Department",
        "Course Code",
        "Marks",
        "Attendance",
        "Performance",
    ];
    if opts.include_fees {
        header.extend(["Total Fees", "Fees Paid", "Balance", "Payment Status"]);
    }

    let mut out = String::new();
    push_row(&mut out, &header);
    for student in students
        .iter()
        .filter(|s| department.map_or(true, |d| s.department == d))
    {
        let record = records.iter().find(|r| r.student_id == student.id);
        let marks = staff_marks_cell(record);
        let attendance = record
            .and_then(|r| r.attendance)
            .map(|a| format!("{}%", a))
            .unwrap_or_else(|| "N/A".to_string());
        let performance = record
            .and_then(|r| r.performance.as_deref())
            .unwrap_or("N/A");

        let mut cells: Vec<String> = vec![
            student.name.clone(),
            student.roll_number.clone(),
            student.department.clone(),
            student.course_code.clone(),
            marks,
            attendance,
            performance.to_string(),
        ];
        if opts.include_fees {
            let sym = &opts.currency_symbol;
            cells.push(money(sym, student.total_fees));
            cells.push(money(sym, student.fees_paid));
            cells.push(money(sym, student.fees_balance));
            cells.push(student.payment_status.clone());
        }
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        push_row(&mut out, &refs);
    }
    Ok(out)
}
