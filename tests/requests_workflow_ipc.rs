use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .env_remove("CAMPUSD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value.get("error").cloned().unwrap_or_default()
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    workspace: PathBuf,
}

fn seeded(prefix: &str) -> Sidecar {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "seed",
        "data.seed",
        json!({ "studentsPerDepartment": 3 }),
    );
    Sidecar {
        child,
        stdin,
        reader,
        workspace,
    }
}

fn finish(mut s: Sidecar) {
    drop(s.stdin);
    let _ = s.child.wait();
    let _ = std::fs::remove_dir_all(s.workspace);
}

#[test]
fn admin_lane_requires_verification_before_approval() {
    let mut s = seeded("campusd-admin-lane");
    let (stdin, reader) = (&mut s.stdin, &mut s.reader);

    let submitted = request_ok(
        stdin,
        reader,
        "1",
        "requests.submit",
        json!({
            "role": "student",
            "studentId": "1000",
            "lane": "admin",
            "field": "email",
            "newValue": "aarav.new@npv.edu"
        }),
    );
    let req = &submitted["request"];
    assert_eq!(req["status"], "pending");
    assert_eq!(req["lane"], "admin");
    assert_eq!(req["rollNumber"], "MCA001");
    assert_eq!(req["currentValue"], "aarav.sharma1@student.npv.edu");
    let id = req["id"].as_str().expect("id").to_string();

    let early = request(stdin, reader, "2", "requests.approve", json!({ "role": "admin1", "id": id }));
    assert_eq!(error_code(&early), "not_verified");

    let q = request_ok(stdin, reader, "3", "requests.queue", json!({ "role": "admin2" }));
    assert_eq!(q["requests"].as_array().map(|a| a.len()), Some(1));

    let staff_try = request(stdin, reader, "4", "requests.verify", json!({ "role": "staff", "id": id }));
    assert_eq!(error_code(&staff_try), "not_permitted");

    let verified = request_ok(stdin, reader, "5", "requests.verify", json!({ "role": "admin2", "id": id }));
    assert_eq!(verified["request"]["status"], "verified-pending");
    assert_eq!(verified["applied"], false);

    let q = request_ok(stdin, reader, "6", "requests.queue", json!({ "role": "admin1" }));
    assert_eq!(q["requests"].as_array().map(|a| a.len()), Some(1));

    let approved = request_ok(stdin, reader, "7", "requests.approve", json!({ "role": "admin1", "id": id }));
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["applied"], true);
    assert_eq!(approved["request"]["history"].as_array().map(|a| a.len()), Some(3));

    let student = request_ok(
        stdin,
        reader,
        "8",
        "records.get",
        json!({ "collection": "students", "id": "1000" }),
    );
    assert_eq!(student["record"]["email"], "aarav.new@npv.edu");

    let again = request(stdin, reader, "9", "requests.reject", json!({ "role": "admin1", "id": id }));
    assert_eq!(error_code(&again), "request_closed");

    finish(s);
}

#[test]
fn staff_lane_approves_directly() {
    let mut s = seeded("campusd-staff-lane");
    let (stdin, reader) = (&mut s.stdin, &mut s.reader);

    let submitted = request_ok(
        stdin,
        reader,
        "1",
        "requests.submit",
        json!({
            "role": "student",
            "studentId": "1001",
            "lane": "staff",
            "field": "marks",
            "newValue": "MCA101:78"
        }),
    );
    let id = submitted["request"]["id"].as_str().expect("id").to_string();

    let wrong_role = request(stdin, reader, "2", "requests.approve", json!({ "role": "admin1", "id": id }));
    assert_eq!(error_code(&wrong_role), "not_permitted");

    let approved = request_ok(stdin, reader, "3", "requests.approve", json!({ "role": "staff", "id": id }));
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["applied"], true);

    let records = request_ok(
        stdin,
        reader,
        "4",
        "records.list",
        json!({ "collection": "studentRecords", "where": { "studentId": "1001" } }),
    );
    assert_eq!(records["records"][0]["marks"]["MCA101"], 78.0);

    let mine = request_ok(
        stdin,
        reader,
        "5",
        "requests.queue",
        json!({ "role": "student", "studentId": "1001" }),
    );
    assert_eq!(mine["requests"][0]["status"], "approved");

    finish(s);
}

#[test]
fn submission_validation_and_protected_collections() {
    let mut s = seeded("campusd-request-validation");
    let (stdin, reader) = (&mut s.stdin, &mut s.reader);

    let by_staff = request(
        stdin,
        reader,
        "1",
        "requests.submit",
        json!({ "role": "staff", "studentId": "1000", "lane": "staff", "field": "attendance", "newValue": "80" }),
    );
    assert_eq!(error_code(&by_staff), "not_permitted");

    let bad_value = request(
        stdin,
        reader,
        "2",
        "requests.submit",
        json!({ "role": "student", "studentId": "1000", "lane": "staff", "field": "attendance", "newValue": "180" }),
    );
    assert_eq!(error_code(&bad_value), "invalid_value");

    let unknown_field = request(
        stdin,
        reader,
        "3",
        "requests.submit",
        json!({ "role": "student", "studentId": "1000", "lane": "admin", "field": "feesPaid", "newValue": "0" }),
    );
    assert_eq!(error_code(&unknown_field), "bad_params");

    let ghost = request(
        stdin,
        reader,
        "4",
        "requests.submit",
        json!({ "role": "student", "studentId": "nobody", "lane": "admin", "field": "name", "newValue": "X" }),
    );
    assert_eq!(error_code(&ghost), "not_found");

    let direct = request(
        stdin,
        reader,
        "5",
        "records.upsert",
        json!({ "collection": "changeRequests", "record": { "id": "x" } }),
    );
    assert_eq!(error_code(&direct), "not_permitted");
    let delete = request(
        stdin,
        reader,
        "6",
        "records.delete",
        json!({ "collection": "changeRequests", "id": "x" }),
    );
    assert_eq!(error_code(&delete), "not_permitted");

    let all = request_ok(stdin, reader, "7", "requests.list", json!({}));
    assert_eq!(all["requests"].as_array().map(|a| a.len()), Some(0));

    finish(s);
}

#[test]
fn approval_for_deleted_student_closes_without_applying() {
    let mut s = seeded("campusd-request-gap");
    let (stdin, reader) = (&mut s.stdin, &mut s.reader);

    let submitted = request_ok(
        stdin,
        reader,
        "1",
        "requests.submit",
        json!({ "role": "student", "studentId": "1002", "lane": "admin", "field": "name", "newValue": "Renamed" }),
    );
    let id = submitted["request"]["id"].as_str().expect("id").to_string();
    request_ok(stdin, reader, "2", "requests.verify", json!({ "role": "admin2", "id": id }));
    request_ok(
        stdin,
        reader,
        "3",
        "records.delete",
        json!({ "collection": "students", "id": "1002" }),
    );

    let approved = request_ok(stdin, reader, "4", "requests.approve", json!({ "role": "admin1", "id": id }));
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["applied"], false);

    let missing = request(
        stdin,
        reader,
        "5",
        "records.get",
        json!({ "collection": "students", "id": "1002" }),
    );
    assert_eq!(error_code(&missing), "not_found");

    finish(s);
}
