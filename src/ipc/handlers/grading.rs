use crate::calc::{self, SubjectScores};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{get_optional_u32, get_required_f64, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Mark, Student, Subject};
use crate::store::{self, Collection, SqliteStore};
use serde_json::{json, Value};

fn grading_grade(params: &Value) -> Result<Value, HandlerErr> {
    let percentage = get_required_f64(params, "percentage")?;
    let grade = calc::grade_for(percentage);
    Ok(json!({ "grade": grade, "gradePoint": grade.point() }))
}

fn grading_subject(params: &Value) -> Result<Value, HandlerErr> {
    let scores: SubjectScores = serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid scores: {}", e)))?;
    let credits = match params.get("credits") {
        None | Some(Value::Null) => 0.0,
        Some(v) => v
            .as_f64()
            .filter(|c| *c >= 0.0)
            .ok_or_else(|| HandlerErr::new("bad_params", "credits must be a non-negative number"))?,
    };
    Ok(json!(calc::aggregate_subject(&scores, credits)))
}

fn grading_cgpa(params: &Value) -> Result<Value, HandlerErr> {
    let Some(raw) = params.get("subjects").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "subjects must be an array"));
    };
    let mut pairs = Vec::with_capacity(raw.len());
    for (i, s) in raw.iter().enumerate() {
        let gp = s
            .get("gradePoint")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= 10);
        let credits = s.get("credits").and_then(|v| v.as_f64()).filter(|c| *c >= 0.0);
        match (gp, credits) {
            (Some(gp), Some(credits)) => pairs.push((gp, credits)),
            _ => {
                return Err(HandlerErr::new(
                    "bad_params",
                    "each subject needs gradePoint in 0..=10 and credits >= 0",
                )
                .with_details(json!({ "index": i })))
            }
        }
    }
    Ok(json!({ "cgpa": calc::cgpa(pairs) }))
}

fn required_semester(store: &SqliteStore, params: &Value) -> Result<u32, HandlerErr> {
    let max = setup::max_semester(store.conn())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    match get_optional_u32(params, "semester")? {
        Some(s) if (1..=max).contains(&s) => Ok(s),
        _ => Err(HandlerErr::new(
            "bad_params",
            format!("semester must be in 1..={}", max),
        )),
    }
}

fn performance_student(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let semester = required_semester(store, params)?;
    let students: Vec<Student> = store::load(store, Collection::Students)?;
    let Some(student) = students.iter().find(|s| s.id == student_id) else {
        return Err(HandlerErr::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id })));
    };
    let subjects: Vec<Subject> = store::load(store, Collection::Subjects)?;
    let marks: Vec<Mark> = store::load(store, Collection::Marks)?;
    Ok(json!(calc::semester_performance(student, &subjects, &marks, semester)))
}

fn performance_department(store: &SqliteStore, params: &Value) -> Result<Value, HandlerErr> {
    let department = get_required_str(params, "department")?;
    let semester = required_semester(store, params)?;
    let mut students: Vec<Student> = store::load(store, Collection::Students)?;
    students.retain(|s| s.department == department);
    students.sort_by(|a, b| a.roll_number.cmp(&b.roll_number));
    let subjects: Vec<Subject> = store::load(store, Collection::Subjects)?;
    let marks: Vec<Mark> = store::load(store, Collection::Marks)?;

    let rows: Vec<_> = students
        .iter()
        .map(|s| calc::semester_performance(s, &subjects, &marks, semester))
        .collect();
    Ok(json!({ "department": department, "semester": semester, "students": rows }))
}

fn respond(req: &Request, result: Result<Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_performance_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    respond(req, performance_student(store, &req.params))
}

fn handle_performance_department(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    respond(req, performance_department(store, &req.params))
}

/// Pure grading methods work without a workspace.
pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.grade" => Some(respond(req, grading_grade(&req.params))),
        "grading.subject" => Some(respond(req, grading_subject(&req.params))),
        "grading.cgpa" => Some(respond(req, grading_cgpa(&req.params))),
        "performance.student" => Some(handle_performance_student(state, req)),
        "performance.department" => Some(handle_performance_department(state, req)),
        _ => None,
    }
}
