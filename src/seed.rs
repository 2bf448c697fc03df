//! Deterministic demo data: departments, students, staff, the subject catalog
//! for semesters 1-2, and allocations tying them together.

use crate::model::{
    AllocationKind, Department, Staff, Student, StudentAllocation, Subject, SubjectAllocation,
    SubjectKind,
};
use crate::store::{self, Collection, RecordStore, StoreError};
use serde::Serialize;

pub const DEFAULT_STUDENTS_PER_DEPARTMENT: u32 = 20;
pub const MAX_STUDENTS_PER_DEPARTMENT: u32 = 999;
const STAFF_PER_DEPARTMENT: usize = 3;
const FIRST_STUDENT_ID: u32 = 1000;
const FIRST_STAFF_ID: u32 = 2000;

const DEPARTMENTS: [(&str, &str); 8] = [
    ("MCA", "Master of Computer Applications"),
    ("BE-CSE", "Computer Science Engineering"),
    ("BE-IT", "Information Technology"),
    ("BE-BME", "Biomedical Engineering"),
    ("BE-MECH", "Mechanical Engineering"),
    ("BE-CIVIL", "Civil Engineering"),
    ("BE-EEE", "Electrical and Electronics Engineering"),
    ("BE-ECE", "Electronics and Communication Engineering"),
];

const FIRST_NAMES: [&str; 20] = [
    "Aarav", "Vivaan", "Aditya", "Vihaan", "Arjun", "Sai", "Arnav", "Ayaan", "Krishna", "Ishaan",
    "Diya", "Ananya", "Saanvi", "Aadhya", "Navya", "Pari", "Sara", "Kavya", "Priya", "Riya",
];
const LAST_NAMES: [&str; 20] = [
    "Sharma", "Kumar", "Patel", "Singh", "Reddy", "Nair", "Iyer", "Verma", "Gupta", "Rao",
    "Mehta", "Joshi", "Shah", "Agarwal", "Pillai", "Menon", "Desai", "Krishnan", "Bhat", "Shetty",
];

const STAFF_TITLES: [&str; 5] = ["Dr.", "Prof.", "Mr.", "Ms.", "Mrs."];
const STAFF_FIRST_NAMES: [&str; 10] = [
    "Rajesh", "Suresh", "Ramesh", "Mahesh", "Dinesh", "Lakshmi", "Priya", "Kavitha", "Deepa",
    "Divya",
];
const STAFF_LAST_NAMES: [&str; 10] = [
    "Kumar", "Rao", "Reddy", "Sharma", "Nair", "Iyer", "Menon", "Patel", "Singh", "Gupta",
];

type CatalogEntry = (&'static str, u32, f64, SubjectKind);

use SubjectKind::{Lab, Practical, Theory};

/// Per department: id prefix, code prefix, then (name, semester, credits, type)
/// in semester order. Codes number from `<semester>01` within each semester.
const CATALOG: [(&str, &str, &[CatalogEntry]); 8] = [
    ("mca", "MCA", &[
        ("Data Structures and Algorithms", 1, 4.0, Theory),
        ("Database Management Systems", 1, 4.0, Theory),
        ("Computer Networks", 1, 3.0, Theory),
        ("Programming Lab", 1, 2.0, Lab),
        ("Advanced Java Programming", 2, 4.0, Theory),
        ("Machine Learning", 2, 4.0, Theory),
        ("Cloud Computing", 2, 3.0, Theory),
        ("AI Lab", 2, 2.0, Lab),
    ]),
    ("cse", "CSE", &[
        ("Programming for Problem Solving", 1, 4.0, Theory),
        ("Engineering Mathematics I", 1, 4.0, Theory),
        ("Engineering Physics", 1, 3.0, Theory),
        ("Basic Electrical Engineering", 1, 3.0, Theory),
        ("Programming Lab", 1, 2.0, Lab),
        ("Data Structures", 2, 4.0, Theory),
        ("Digital Logic Design", 2, 4.0, Theory),
        ("Engineering Mathematics II", 2, 4.0, Theory),
        ("Object Oriented Programming", 2, 3.0, Theory),
    ]),
    ("it", "IT", &[
        ("Programming in C", 1, 4.0, Theory),
        ("Mathematics for IT", 1, 4.0, Theory),
        ("Digital Electronics", 1, 3.0, Theory),
        ("Communication Skills", 1, 3.0, Theory),
        ("Programming Lab", 1, 2.0, Lab),
        ("Web Technologies", 2, 4.0, Theory),
        ("Database Systems", 2, 4.0, Theory),
        ("Computer Networks", 2, 4.0, Theory),
        ("Software Engineering", 2, 3.0, Theory),
    ]),
    ("bme", "BME", &[
        ("Human Anatomy and Physiology", 1, 4.0, Theory),
        ("Engineering Mathematics", 1, 4.0, Theory),
        ("Basic Electrical Engineering", 1, 3.0, Theory),
        ("Engineering Physics", 1, 3.0, Theory),
        ("Biology Lab", 1, 2.0, Lab),
        ("Medical Electronics", 2, 4.0, Theory),
        ("Biomaterials", 2, 4.0, Theory),
        ("Signal Processing", 2, 4.0, Theory),
        ("Medical Instrumentation", 2, 3.0, Theory),
    ]),
    ("mech", "MECH", &[
        ("Engineering Mechanics", 1, 4.0, Theory),
        ("Engineering Graphics", 1, 4.0, Theory),
        ("Mathematics I", 1, 4.0, Theory),
        ("Basic Electrical Engineering", 1, 3.0, Theory),
        ("Workshop Practice", 1, 2.0, Practical),
        ("Thermodynamics", 2, 4.0, Theory),
        ("Strength of Materials", 2, 4.0, Theory),
        ("Manufacturing Processes", 2, 4.0, Theory),
        ("Fluid Mechanics", 2, 3.0, Theory),
    ]),
    ("civil", "CIVIL", &[
        ("Engineering Mechanics", 1, 4.0, Theory),
        ("Building Materials", 1, 4.0, Theory),
        ("Engineering Mathematics", 1, 4.0, Theory),
        ("Surveying", 1, 3.0, Theory),
        ("Surveying Lab", 1, 2.0, Lab),
        ("Structural Analysis", 2, 4.0, Theory),
        ("Concrete Technology", 2, 4.0, Theory),
        ("Geotechnical Engineering", 2, 4.0, Theory),
        ("Hydraulics", 2, 3.0, Theory),
    ]),
    ("eee", "EEE", &[
        ("Circuit Theory", 1, 4.0, Theory),
        ("Electromagnetic Fields", 1, 4.0, Theory),
        ("Engineering Mathematics", 1, 4.0, Theory),
        ("Electronic Devices", 1, 3.0, Theory),
        ("Electrical Lab", 1, 2.0, Lab),
        ("Power Systems", 2, 4.0, Theory),
        ("Electrical Machines", 2, 4.0, Theory),
        ("Control Systems", 2, 4.0, Theory),
        ("Power Electronics", 2, 3.0, Theory),
    ]),
    ("ece", "ECE", &[
        ("Signals and Systems", 1, 4.0, Theory),
        ("Electronic Circuits", 1, 4.0, Theory),
        ("Engineering Mathematics", 1, 4.0, Theory),
        ("Network Theory", 1, 3.0, Theory),
        ("Electronics Lab", 1, 2.0, Lab),
        ("Digital Signal Processing", 2, 4.0, Theory),
        ("Communication Systems", 2, 4.0, Theory),
        ("Microprocessors", 2, 4.0, Theory),
        ("VLSI Design", 2, 3.0, Theory),
    ]),
];

fn total_fees_for(dept_code: &str) -> f64 {
    if dept_code == "MCA" {
        150_000.0
    } else {
        200_000.0
    }
}

/// Every fifth student has paid in full; the rest owe a spread of balances.
fn fees_paid_for(total: f64, dept_index: usize, i: u32) -> f64 {
    if i % 5 == 0 {
        return total;
    }
    let pct = (i as usize * 37 + dept_index * 11) % 95;
    (total * pct as f64 / 100.0).floor()
}

pub fn subject_catalog() -> Vec<Subject> {
    let mut out = Vec::new();
    for ((dept_code, _), (id_prefix, code_prefix, entries)) in DEPARTMENTS.iter().zip(CATALOG.iter()) {
        let mut per_semester = [0u32; 3];
        for (n, (name, semester, credits, kind)) in entries.iter().enumerate() {
            let slot = &mut per_semester[*semester as usize];
            *slot += 1;
            out.push(Subject {
                id: format!("{}-{}", id_prefix, n + 1),
                name: name.to_string(),
                code: format!("{}{}{:02}", code_prefix, semester, slot),
                department: dept_code.to_string(),
                semester: *semester,
                credits: *credits,
                kind: *kind,
            });
        }
    }
    out
}

fn members_of<'a>(staff: &'a [Staff], dept_code: &str) -> Vec<&'a Staff> {
    staff.iter().filter(|s| s.department == dept_code).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSummary {
    pub departments: usize,
    pub students: usize,
    pub staff: usize,
    pub subjects: usize,
    pub subject_allocations: usize,
    pub student_allocations: usize,
}

/// Clears every collection, then writes the demo data set.
pub fn seed_sample_data<S: RecordStore + ?Sized>(
    store: &mut S,
    students_per_department: u32,
) -> Result<SeedSummary, StoreError> {
    store::reset_all(store)?;

    let departments: Vec<Department> = DEPARTMENTS
        .iter()
        .enumerate()
        .map(|(i, (code, name))| Department {
            id: (i + 1).to_string(),
            name: name.to_string(),
            code: code.to_string(),
        })
        .collect();

    let mut students = Vec::new();
    let mut staff = Vec::new();
    let mut next_student_id = FIRST_STUDENT_ID;
    let mut next_staff_id = FIRST_STAFF_ID;

    for (d, dept) in departments.iter().enumerate() {
        for i in 1..=students_per_department {
            let pool = (d * 20 + i as usize - 1) % FIRST_NAMES.len();
            let first = FIRST_NAMES[pool];
            let last = LAST_NAMES[pool % LAST_NAMES.len()];
            let total_fees = total_fees_for(&dept.code);
            let mut student = Student {
                id: next_student_id.to_string(),
                name: format!("{} {}", first, last),
                roll_number: format!("{}{:03}", dept.code, i),
                email: format!(
                    "{}.{}{}@student.npv.edu",
                    first.to_lowercase(),
                    last.to_lowercase(),
                    i
                ),
                department: dept.code.clone(),
                course_code: dept.code.clone(),
                total_fees,
                fees_paid: fees_paid_for(total_fees, d, i),
                ..Student::default()
            };
            student.normalize_fees();
            students.push(student);
            next_student_id += 1;
        }

        for i in 1..=STAFF_PER_DEPARTMENT {
            let pool = (d * STAFF_PER_DEPARTMENT + i - 1) % STAFF_FIRST_NAMES.len();
            let first = STAFF_FIRST_NAMES[pool];
            let last = STAFF_LAST_NAMES[pool % STAFF_LAST_NAMES.len()];
            staff.push(Staff {
                id: next_staff_id.to_string(),
                name: format!("{} {} {}", STAFF_TITLES[i % STAFF_TITLES.len()], first, last),
                email: format!(
                    "{}.{}{}@staff.npv.edu",
                    first.to_lowercase(),
                    last.to_lowercase(),
                    d + 1
                ),
                department: dept.code.clone(),
            });
            next_staff_id += 1;
        }
    }

    let subjects = subject_catalog();

    let mut subject_allocations = Vec::new();
    for dept in &departments {
        let members = members_of(&staff, &dept.code);
        if members.is_empty() {
            continue;
        }
        for (n, subject) in subjects.iter().filter(|s| s.department == dept.code).enumerate() {
            let member = members[n % members.len()];
            subject_allocations.push(SubjectAllocation {
                id: format!("sa-{}", subject.id),
                staff_id: member.id.clone(),
                staff_name: member.name.clone(),
                department: dept.code.clone(),
                subject_code: subject.code.clone(),
                kind: AllocationKind::Primary,
            });
        }
    }

    let mut student_allocations = Vec::new();
    for dept in &departments {
        let members = members_of(&staff, &dept.code);
        if members.is_empty() {
            continue;
        }
        for (n, student) in students.iter().filter(|s| s.department == dept.code).enumerate() {
            let advisor = members[n % members.len()];
            student_allocations.push(StudentAllocation {
                id: format!("adv-{}", student.id),
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                roll_number: student.roll_number.clone(),
                advisor_id: advisor.id.clone(),
                advisor_name: advisor.name.clone(),
                department: dept.code.clone(),
            });
        }
    }

    store::save(store, Collection::Departments, &departments)?;
    store::save(store, Collection::Students, &students)?;
    store::save(store, Collection::Staff, &staff)?;
    store::save(store, Collection::Subjects, &subjects)?;
    store::save(store, Collection::SubjectAllocations, &subject_allocations)?;
    store::save(store, Collection::StudentAllocations, &student_allocations)?;

    let summary = SeedSummary {
        departments: departments.len(),
        students: students.len(),
        staff: staff.len(),
        subjects: subjects.len(),
        subject_allocations: subject_allocations.len(),
        student_allocations: student_allocations.len(),
    };
    tracing::info!(?summary, "sample data seeded");
    Ok(summary)
}
