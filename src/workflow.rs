//! Change-request approval workflow.
//!
//! A student proposes a new value for one attribute. The request travels one
//! of two lanes, fixed at submission:
//!
//! - staff lane (academic fields): `pending -> approved | rejected`, decided by Staff;
//! - admin lane (student attributes): Admin2 verifies or rejects a pending
//!   request, then Admin1 approves or rejects the verified one.
//!
//! `approved` and `rejected` are terminal. Approval writes `newValue` into
//! exactly one field of exactly one record.

use crate::model::{AcademicField, FieldError, Student, StudentField, StudentRecord};
use crate::store::{self, Collection, RecordStore, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Staff,
    Admin,
}

impl Lane {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "staff" => Some(Self::Staff),
            "admin" | "admin2" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "verified-pending")]
    Verified,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "rejected")]
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "verified-pending" | "verified" => Some(Self::Verified),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Parent,
    Staff,
    Admin1,
    Admin2,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "parent" => Some(Self::Parent),
            "staff" => Some(Self::Staff),
            "admin1" => Some(Self::Admin1),
            "admin2" => Some(Self::Admin2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Verify,
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    pub status: RequestStatus,
    pub role: Role,
    pub at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub field: String,
    pub current_value: String,
    pub new_value: String,
    pub status: RequestStatus,
    pub lane: Lane,
    pub created_at: String,
    #[serde(default)]
    pub history: Vec<RequestEvent>,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{role:?} may not submit change requests")]
    SubmitNotPermitted { role: Role },
    #[error("field {field} cannot be changed through the {lane:?} lane")]
    FieldNotInLane { field: String, lane: Lane },
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("change request not found: {0}")]
    RequestNotFound(String),
    #[error("request must be verified by Admin 2 first")]
    NotVerified,
    #[error("request is already {status:?}")]
    Closed { status: RequestStatus },
    #[error("{role:?} may not {decision:?} a {status:?} request in the {lane:?} lane")]
    NotPermitted {
        lane: Lane,
        status: RequestStatus,
        decision: Decision,
        role: Role,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SubmitNotPermitted { .. } | Self::NotPermitted { .. } => "not_permitted",
            Self::FieldNotInLane { .. } => "bad_params",
            Self::Field(FieldError::UnknownField(_)) => "bad_params",
            Self::Field(FieldError::InvalidValue { .. }) => "invalid_value",
            Self::StudentNotFound(_) | Self::RequestNotFound(_) => "not_found",
            Self::NotVerified => "not_verified",
            Self::Closed { .. } => "request_closed",
            Self::Store(e) => e.code(),
        }
    }
}

/// The only legal (lane, status, decision, role) moves.
pub fn transition(
    lane: Lane,
    status: RequestStatus,
    decision: Decision,
    role: Role,
) -> Result<RequestStatus, WorkflowError> {
    use Decision::{Approve, Reject, Verify};
    use RequestStatus::{Pending, Verified};

    if status.is_terminal() {
        return Err(WorkflowError::Closed { status });
    }

    let next = match (lane, status, decision, role) {
        (Lane::Staff, Pending, Approve, Role::Staff) => Some(RequestStatus::Approved),
        (Lane::Staff, Pending, Reject, Role::Staff) => Some(RequestStatus::Rejected),

        (Lane::Admin, Pending, Verify, Role::Admin2) => Some(Verified),
        (Lane::Admin, Pending, Reject, Role::Admin2 | Role::Admin1) => {
            Some(RequestStatus::Rejected)
        }
        (Lane::Admin, Pending, Approve, Role::Admin1) => return Err(WorkflowError::NotVerified),
        (Lane::Admin, Verified, Approve, Role::Admin1) => Some(RequestStatus::Approved),
        (Lane::Admin, Verified, Reject, Role::Admin1) => Some(RequestStatus::Rejected),
        _ => None,
    };

    next.ok_or(WorkflowError::NotPermitted {
        lane,
        status,
        decision,
        role,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetField {
    Student(StudentField),
    Academic(AcademicField),
}

fn resolve_field(lane: Lane, name: &str) -> Result<TargetField, WorkflowError> {
    let target = StudentField::parse(name)
        .map(TargetField::Student)
        .or_else(|| AcademicField::parse(name).map(TargetField::Academic))
        .ok_or_else(|| FieldError::UnknownField(name.to_string()))?;
    match (lane, target) {
        (Lane::Admin, TargetField::Student(_)) | (Lane::Staff, TargetField::Academic(_)) => {
            Ok(target)
        }
        _ => Err(WorkflowError::FieldNotInLane {
            field: name.to_string(),
            lane,
        }),
    }
}

fn validate_value(target: TargetField, raw: &str) -> Result<(), FieldError> {
    match target {
        TargetField::Student(f) => f.coerce(raw).map(|_| ()),
        TargetField::Academic(f) => f.coerce(raw).map(|_| ()),
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub student_id: String,
    pub lane: Lane,
    pub field: String,
    pub current_value: Option<String>,
    pub new_value: String,
}

pub fn submit<S: RecordStore + ?Sized>(
    store: &mut S,
    role: Role,
    submission: Submission,
    now: &str,
) -> Result<ChangeRequest, WorkflowError> {
    if role != Role::Student {
        return Err(WorkflowError::SubmitNotPermitted { role });
    }
    let target = resolve_field(submission.lane, &submission.field)?;
    validate_value(target, &submission.new_value)?;

    let students: Vec<Student> = store::load(store, Collection::Students)?;
    let student = students
        .iter()
        .find(|s| s.id == submission.student_id)
        .ok_or_else(|| WorkflowError::StudentNotFound(submission.student_id.clone()))?;

    let current_value = match submission.current_value {
        Some(v) => v,
        None => match target {
            TargetField::Student(f) => student.field_value(f).to_string(),
            TargetField::Academic(_) => String::new(),
        },
    };

    let request = ChangeRequest {
        id: Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        roll_number: student.roll_number.clone(),
        field: submission.field,
        current_value,
        new_value: submission.new_value,
        status: RequestStatus::Pending,
        lane: submission.lane,
        created_at: now.to_string(),
        history: vec![RequestEvent {
            status: RequestStatus::Pending,
            role,
            at: now.to_string(),
        }],
    };

    let mut requests: Vec<ChangeRequest> = store::load(store, Collection::ChangeRequests)?;
    requests.push(request.clone());
    store::save(store, Collection::ChangeRequests, &requests)?;

    tracing::info!(
        request_id = %request.id,
        student_id = %request.student_id,
        field = %request.field,
        lane = ?request.lane,
        "change request submitted"
    );
    Ok(request)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOutcome {
    pub request: ChangeRequest,
    /// Whether an approval wrote to a record. False for verify/reject and
    /// for approvals whose student no longer exists.
    pub applied: bool,
}

pub fn decide<S: RecordStore + ?Sized>(
    store: &mut S,
    request_id: &str,
    decision: Decision,
    role: Role,
    now: &str,
) -> Result<DecisionOutcome, WorkflowError> {
    let mut requests: Vec<ChangeRequest> = store::load(store, Collection::ChangeRequests)?;
    let idx = requests
        .iter()
        .position(|r| r.id == request_id)
        .ok_or_else(|| WorkflowError::RequestNotFound(request_id.to_string()))?;

    let current = &requests[idx];
    let next = transition(current.lane, current.status, decision, role)?;

    let mut applied = false;
    if next == RequestStatus::Approved {
        applied = apply_change(store, current)?;
        if !applied {
            tracing::warn!(
                request_id = %current.id,
                student_id = %current.student_id,
                "approved change request targets a missing student; no record updated"
            );
        }
    }

    let request = &mut requests[idx];
    request.status = next;
    request.history.push(RequestEvent {
        status: next,
        role,
        at: now.to_string(),
    });
    let request = request.clone();
    store::save(store, Collection::ChangeRequests, &requests)?;

    tracing::info!(
        request_id = %request.id,
        status = ?request.status,
        role = ?role,
        applied,
        "change request decided"
    );
    Ok(DecisionOutcome { request, applied })
}

/// Writes the request's new value. Returns false when the student is gone.
fn apply_change<S: RecordStore + ?Sized>(
    store: &mut S,
    request: &ChangeRequest,
) -> Result<bool, WorkflowError> {
    let target = resolve_field(request.lane, &request.field)?;
    let mut students: Vec<Student> = store::load(store, Collection::Students)?;
    let Some(student_idx) = students.iter().position(|s| s.id == request.student_id) else {
        validate_value(target, &request.new_value)?;
        return Ok(false);
    };

    match target {
        TargetField::Student(field) => {
            students[student_idx].set_field(field, &request.new_value)?;
            store::save(store, Collection::Students, &students)?;
        }
        TargetField::Academic(field) => {
            let update = field.coerce(&request.new_value)?;
            let student = &students[student_idx];
            let mut records: Vec<StudentRecord> = store::load(store, Collection::StudentRecords)?;
            match records.iter_mut().find(|r| r.student_id == student.id) {
                Some(r) => r.apply(&update),
                None => {
                    let mut r = StudentRecord {
                        id: Uuid::new_v4().to_string(),
                        student_id: student.id.clone(),
                        student_name: student.name.clone(),
                        ..StudentRecord::default()
                    };
                    r.apply(&update);
                    records.push(r);
                }
            }
            store::save(store, Collection::StudentRecords, &records)?;
        }
    }
    Ok(true)
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub lane: Option<Lane>,
    pub status: Option<RequestStatus>,
    pub student_id: Option<String>,
}

impl RequestFilter {
    /// What each dashboard acts on next.
    pub fn queue_for(role: Role, student_id: Option<String>) -> Self {
        match role {
            Role::Staff => Self {
                lane: Some(Lane::Staff),
                status: Some(RequestStatus::Pending),
                student_id: None,
            },
            Role::Admin2 => Self {
                lane: Some(Lane::Admin),
                status: Some(RequestStatus::Pending),
                student_id: None,
            },
            Role::Admin1 => Self {
                lane: Some(Lane::Admin),
                status: Some(RequestStatus::Verified),
                student_id: None,
            },
            Role::Student | Role::Parent => Self {
                lane: None,
                status: None,
                student_id,
            },
        }
    }

    fn matches(&self, r: &ChangeRequest) -> bool {
        self.lane.map(|l| r.lane == l).unwrap_or(true)
            && self.status.map(|s| r.status == s).unwrap_or(true)
            && self
                .student_id
                .as_deref()
                .map(|id| r.student_id == id)
                .unwrap_or(true)
    }
}

pub fn list<S: RecordStore + ?Sized>(
    store: &S,
    filter: &RequestFilter,
) -> Result<Vec<ChangeRequest>, WorkflowError> {
    let requests: Vec<ChangeRequest> = store::load(store, Collection::ChangeRequests)?;
    Ok(requests.into_iter().filter(|r| filter.matches(r)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const NOW: &str = "2024-08-01T10:00:00+00:00";

    fn store_with_student() -> MemoryStore {
        let mut store = MemoryStore::new();
        let students = vec![Student {
            id: "1000".into(),
            name: "Aarav Sharma".into(),
            roll_number: "MCA001".into(),
            email: "aarav.sharma1@student.npv.edu".into(),
            department: "MCA".into(),
            course_code: "MCA".into(),
            ..Student::default()
        }];
        store::save(&mut store, Collection::Students, &students).expect("seed");
        store
    }

    fn submit_field(store: &mut MemoryStore, lane: Lane, field: &str, value: &str) -> ChangeRequest {
        submit(
            store,
            Role::Student,
            Submission {
                student_id: "1000".into(),
                lane,
                field: field.into(),
                current_value: None,
                new_value: value.into(),
            },
            NOW,
        )
        .expect("submit")
    }

    fn student(store: &MemoryStore) -> Student {
        let all: Vec<Student> = store::load(store, Collection::Students).expect("load");
        all.into_iter().next().expect("student")
    }

    #[test]
    fn transition_table_staff_lane() {
        assert_eq!(
            transition(Lane::Staff, RequestStatus::Pending, Decision::Approve, Role::Staff).unwrap(),
            RequestStatus::Approved
        );
        assert_eq!(
            transition(Lane::Staff, RequestStatus::Pending, Decision::Reject, Role::Staff).unwrap(),
            RequestStatus::Rejected
        );
        assert!(matches!(
            transition(Lane::Staff, RequestStatus::Pending, Decision::Verify, Role::Staff),
            Err(WorkflowError::NotPermitted { .. })
        ));
        assert!(matches!(
            transition(Lane::Staff, RequestStatus::Pending, Decision::Approve, Role::Admin1),
            Err(WorkflowError::NotPermitted { .. })
        ));
    }

    #[test]
    fn transition_table_admin_lane() {
        assert_eq!(
            transition(Lane::Admin, RequestStatus::Pending, Decision::Verify, Role::Admin2).unwrap(),
            RequestStatus::Verified
        );
        assert!(matches!(
            transition(Lane::Admin, RequestStatus::Pending, Decision::Approve, Role::Admin1),
            Err(WorkflowError::NotVerified)
        ));
        assert!(matches!(
            transition(Lane::Admin, RequestStatus::Pending, Decision::Approve, Role::Admin2),
            Err(WorkflowError::NotPermitted { .. })
        ));
        assert!(matches!(
            transition(Lane::Admin, RequestStatus::Verified, Decision::Verify, Role::Admin2),
            Err(WorkflowError::NotPermitted { .. })
        ));
        assert_eq!(
            transition(Lane::Admin, RequestStatus::Verified, Decision::Reject, Role::Admin1).unwrap(),
            RequestStatus::Rejected
        );
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let decisions = [Decision::Verify, Decision::Approve, Decision::Reject];
        let roles = [Role::Student, Role::Parent, Role::Staff, Role::Admin1, Role::Admin2];
        for lane in [Lane::Staff, Lane::Admin] {
            for status in [RequestStatus::Approved, RequestStatus::Rejected] {
                for d in decisions {
                    for r in roles {
                        assert!(matches!(
                            transition(lane, status, d, r),
                            Err(WorkflowError::Closed { .. })
                        ));
                    }
                }
            }
        }
    }

    #[test]
    fn admin_lane_applies_new_value_after_verification() {
        let mut store = store_with_student();
        let req = submit_field(&mut store, Lane::Admin, "email", "aarav.s@npv.edu");
        assert_eq!(req.current_value, "aarav.sharma1@student.npv.edu");
        assert_eq!(req.roll_number, "MCA001");

        let err = decide(&mut store, &req.id, Decision::Approve, Role::Admin1, NOW).unwrap_err();
        assert_eq!(err.code(), "not_verified");
        let still = list(&store, &RequestFilter::default()).expect("list");
        assert_eq!(still[0].status, RequestStatus::Pending);
        assert_eq!(student(&store).email, "aarav.sharma1@student.npv.edu");

        let verified = decide(&mut store, &req.id, Decision::Verify, Role::Admin2, NOW).expect("verify");
        assert_eq!(verified.request.status, RequestStatus::Verified);
        assert!(!verified.applied);

        let approved = decide(&mut store, &req.id, Decision::Approve, Role::Admin1, NOW).expect("approve");
        assert_eq!(approved.request.status, RequestStatus::Approved);
        assert!(approved.applied);
        assert_eq!(approved.request.history.len(), 3);
        assert_eq!(student(&store).email, "aarav.s@npv.edu");

        let err = decide(&mut store, &req.id, Decision::Reject, Role::Admin1, NOW).unwrap_err();
        assert_eq!(err.code(), "request_closed");
    }

    #[test]
    fn staff_lane_approves_directly_into_student_records() {
        let mut store = store_with_student();
        let req = submit_field(&mut store, Lane::Staff, "marks", "MCA101:82");
        let out = decide(&mut store, &req.id, Decision::Approve, Role::Staff, NOW).expect("approve");
        assert_eq!(out.request.status, RequestStatus::Approved);
        assert!(out.applied);

        let records: Vec<StudentRecord> =
            store::load(&store, Collection::StudentRecords).expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].marks["MCA101"], 82.0);
    }

    #[test]
    fn fields_are_bound_to_their_lane() {
        let mut store = store_with_student();
        let err = submit(
            &mut store,
            Role::Student,
            Submission {
                student_id: "1000".into(),
                lane: Lane::Staff,
                field: "email".into(),
                current_value: None,
                new_value: "x@y".into(),
            },
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_params");

        let err = submit(
            &mut store,
            Role::Student,
            Submission {
                student_id: "1000".into(),
                lane: Lane::Admin,
                field: "feesPaid".into(),
                current_value: None,
                new_value: "0".into(),
            },
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        assert!(list(&store, &RequestFilter::default()).expect("list").is_empty());
    }

    #[test]
    fn only_students_submit() {
        let mut store = store_with_student();
        let err = submit(
            &mut store,
            Role::Admin1,
            Submission {
                student_id: "1000".into(),
                lane: Lane::Admin,
                field: "name".into(),
                current_value: None,
                new_value: "X".into(),
            },
            NOW,
        )
        .unwrap_err();
        assert_eq!(err.code(), "not_permitted");
    }

    #[test]
    fn approval_for_missing_student_still_closes_request() {
        let mut store = store_with_student();
        let req = submit_field(&mut store, Lane::Admin, "name", "Aarav K Sharma");
        decide(&mut store, &req.id, Decision::Verify, Role::Admin2, NOW).expect("verify");
        store.put("students", Vec::new()).expect("drop students");

        let out = decide(&mut store, &req.id, Decision::Approve, Role::Admin1, NOW).expect("approve");
        assert_eq!(out.request.status, RequestStatus::Approved);
        assert!(!out.applied);
        assert!(store.get("students").expect("get").is_empty());
    }

    #[test]
    fn queues_follow_roles() {
        let mut store = store_with_student();
        let staff_req = submit_field(&mut store, Lane::Staff, "attendance", "88");
        let admin_req = submit_field(&mut store, Lane::Admin, "courseCode", "MCA-AI");
        decide(&mut store, &admin_req.id, Decision::Verify, Role::Admin2, NOW).expect("verify");

        let staff_q = list(&store, &RequestFilter::queue_for(Role::Staff, None)).expect("q");
        assert_eq!(staff_q.len(), 1);
        assert_eq!(staff_q[0].id, staff_req.id);

        assert!(list(&store, &RequestFilter::queue_for(Role::Admin2, None))
            .expect("q")
            .is_empty());
        let admin1_q = list(&store, &RequestFilter::queue_for(Role::Admin1, None)).expect("q");
        assert_eq!(admin1_q.len(), 1);

        let mine = list(
            &store,
            &RequestFilter::queue_for(Role::Student, Some("1000".into())),
        )
        .expect("q");
        assert_eq!(mine.len(), 2);
    }
}
