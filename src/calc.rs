use crate::model::{AttendanceRecord, AttendanceStatus, Mark, Student, Subject};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Denominator of a subject's percentage. Kept equal to the sum of the four
/// assessment maxima; the assertion below fails the build if they drift.
pub const SUBJECT_MAX_TOTAL: u32 = 100;

/// Max marks for assessment labels outside the fixed four.
pub const DEFAULT_MAX_MARKS: u32 = 100;

const _: () = assert!(
    AssessmentType::Internal1.max_marks()
        + AssessmentType::Internal2.max_marks()
        + AssessmentType::Assignment.max_marks()
        + AssessmentType::EndSem.max_marks()
        == SUBJECT_MAX_TOTAL
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssessmentType {
    Internal1,
    Internal2,
    Assignment,
    EndSem,
}

impl AssessmentType {
    pub const ALL: [AssessmentType; 4] = [
        AssessmentType::Internal1,
        AssessmentType::Internal2,
        AssessmentType::Assignment,
        AssessmentType::EndSem,
    ];

    pub const fn max_marks(self) -> u32 {
        match self {
            Self::Internal1 => 20,
            Self::Internal2 => 20,
            Self::Assignment => 10,
            Self::EndSem => 50,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal1 => "Internal1",
            Self::Internal2 => "Internal2",
            Self::Assignment => "Assignment",
            Self::EndSem => "EndSem",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

pub fn max_marks_for(label: &str) -> u32 {
    AssessmentType::parse(label)
        .map(AssessmentType::max_marks)
        .unwrap_or(DEFAULT_MAX_MARKS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "O")]
    O,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "F")]
    F,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Self::O => "O",
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::C => "C",
            Self::F => "F",
        }
    }

    pub fn point(self) -> u32 {
        match self {
            Self::O => 10,
            Self::APlus => 9,
            Self::A => 8,
            Self::BPlus => 7,
            Self::B => 6,
            Self::C => 5,
            Self::F => 0,
        }
    }
}

/// Descending lower bounds; the first band whose bound is met wins.
const GRADE_BANDS: [(f64, Grade); 6] = [
    (90.0, Grade::O),
    (80.0, Grade::APlus),
    (70.0, Grade::A),
    (60.0, Grade::BPlus),
    (50.0, Grade::B),
    (40.0, Grade::C),
];

pub fn grade_for(percentage: f64) -> Grade {
    GRADE_BANDS
        .iter()
        .find(|(min, _)| percentage >= *min)
        .map(|(_, g)| *g)
        .unwrap_or(Grade::F)
}

/// Round half up to 2 decimals: `floor(100*x + 0.5) / 100`.
pub fn round_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectScores {
    pub internal1: f64,
    pub internal2: f64,
    pub assignment: f64,
    pub end_sem: f64,
}

impl SubjectScores {
    /// Missing assessments contribute 0.
    pub fn from_marks<'a, I>(marks: I) -> Self
    where
        I: IntoIterator<Item = &'a Mark>,
    {
        let mut out = SubjectScores::default();
        let mut seen: Vec<AssessmentType> = Vec::new();
        for m in marks {
            let Some(t) = AssessmentType::parse(&m.assessment_type) else {
                continue;
            };
            if seen.contains(&t) {
                continue;
            }
            seen.push(t);
            match t {
                AssessmentType::Internal1 => out.internal1 = m.marks_obtained,
                AssessmentType::Internal2 => out.internal2 = m.marks_obtained,
                AssessmentType::Assignment => out.assignment = m.marks_obtained,
                AssessmentType::EndSem => out.end_sem = m.marks_obtained,
            }
        }
        out
    }

    pub fn total(&self) -> f64 {
        self.internal1 + self.internal2 + self.assignment + self.end_sem
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrade {
    pub credits: f64,
    pub total: f64,
    pub max_total: u32,
    pub percentage: f64,
    pub grade: Grade,
    pub grade_point: u32,
}

pub fn aggregate_subject(scores: &SubjectScores, credits: f64) -> SubjectGrade {
    let total = scores.total();
    let percentage = total * 100.0 / f64::from(SUBJECT_MAX_TOTAL);
    let grade = grade_for(percentage);
    SubjectGrade {
        credits,
        total,
        max_total: SUBJECT_MAX_TOTAL,
        percentage,
        grade,
        grade_point: grade.point(),
    }
}

/// Credit-weighted grade point mean over `(grade_point, credits)` pairs.
pub fn cgpa<I>(subjects: I) -> f64
where
    I: IntoIterator<Item = (u32, f64)>,
{
    let mut credits_sum = 0.0;
    let mut weighted = 0.0;
    for (gp, credits) in subjects {
        credits_sum += credits;
        weighted += f64::from(gp) * credits;
    }
    if credits_sum == 0.0 {
        return 0.0;
    }
    round_2_decimals(weighted / credits_sum)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub subject_id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: f64,
    pub internal1: f64,
    pub internal2: f64,
    pub assignment: f64,
    pub end_sem: f64,
    pub total: f64,
    pub max_total: u32,
    pub percentage: f64,
    pub grade: Grade,
    pub grade_point: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterPerformance {
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub department: String,
    pub semester: u32,
    pub subjects: Vec<SubjectPerformance>,
    pub total_marks: f64,
    pub max_total_marks: u32,
    pub percentage: f64,
    pub cgpa: f64,
    pub grade: Grade,
}

pub fn semester_performance(
    student: &Student,
    subjects: &[Subject],
    marks: &[Mark],
    semester: u32,
) -> SemesterPerformance {
    let student_marks: Vec<&Mark> = marks
        .iter()
        .filter(|m| m.student_id == student.id)
        .collect();

    let per_subject: Vec<SubjectPerformance> = subjects
        .iter()
        .filter(|s| s.department == student.department && s.semester == semester)
        .map(|subject| {
            let scores = SubjectScores::from_marks(
                student_marks
                    .iter()
                    .copied()
                    .filter(|m| m.subject_id == subject.id),
            );
            let g = aggregate_subject(&scores, subject.credits);
            SubjectPerformance {
                subject_id: subject.id.clone(),
                subject_code: subject.code.clone(),
                subject_name: subject.name.clone(),
                credits: subject.credits,
                internal1: scores.internal1,
                internal2: scores.internal2,
                assignment: scores.assignment,
                end_sem: scores.end_sem,
                total: g.total,
                max_total: g.max_total,
                percentage: round_2_decimals(g.percentage),
                grade: g.grade,
                grade_point: g.grade_point,
            }
        })
        .collect();

    let total_marks: f64 = per_subject.iter().map(|s| s.total).sum();
    let max_total_marks: u32 = per_subject.iter().map(|s| s.max_total).sum();
    let percentage = if max_total_marks > 0 {
        total_marks * 100.0 / f64::from(max_total_marks)
    } else {
        0.0
    };
    let cgpa = cgpa(per_subject.iter().map(|s| (s.grade_point, s.credits)));

    SemesterPerformance {
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        roll_number: student.roll_number.clone(),
        department: student.department.clone(),
        semester,
        subjects: per_subject,
        total_marks,
        max_total_marks,
        percentage: round_2_decimals(percentage),
        cgpa,
        grade: grade_for(percentage),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub department: String,
    pub total_classes: u32,
    pub present: u32,
    pub absent: u32,
    pub percentage: u32,
    pub band: AttendanceBand,
    pub shortage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceBand {
    Excellent,
    Good,
    Average,
    Poor,
}

/// Bands on the rounded percentage: >=85, >=75, >=65, else Poor.
pub fn attendance_band(percentage: u32) -> AttendanceBand {
    match percentage {
        85.. => AttendanceBand::Excellent,
        75..=84 => AttendanceBand::Good,
        65..=74 => AttendanceBand::Average,
        _ => AttendanceBand::Poor,
    }
}

pub fn attendance_percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(present) / f64::from(total) * 100.0).round() as u32
}

pub fn attendance_summary(
    records: &[AttendanceRecord],
    department: Option<&str>,
    shortage_threshold: u32,
) -> Vec<StudentAttendance> {
    let mut order: Vec<String> = Vec::new();
    let mut by_student: HashMap<String, StudentAttendance> = HashMap::new();

    for r in records {
        if let Some(dept) = department {
            if r.department != dept {
                continue;
            }
        }
        let entry = by_student.entry(r.student_id.clone()).or_insert_with(|| {
            order.push(r.student_id.clone());
            StudentAttendance {
                student_id: r.student_id.clone(),
                student_name: r.student_name.clone(),
                roll_number: r.roll_number.clone(),
                department: r.department.clone(),
                total_classes: 0,
                present: 0,
                absent: 0,
                percentage: 0,
                band: AttendanceBand::Poor,
                shortage: false,
            }
        });
        entry.total_classes += 1;
        match r.status {
            AttendanceStatus::Present => entry.present += 1,
            AttendanceStatus::Absent => entry.absent += 1,
        }
    }

    let mut out: Vec<StudentAttendance> = order
        .into_iter()
        .filter_map(|id| by_student.remove(&id))
        .map(|mut a| {
            a.percentage = attendance_percentage(a.present, a.total_classes);
            a.band = attendance_band(a.percentage);
            a.shortage = a.percentage < shortage_threshold;
            a
        })
        .collect();
    out.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
    out
}
