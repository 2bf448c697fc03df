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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("campusd-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");
    let csv_out = workspace.join("smoke-report.csv");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        ("workspace.select", json!({ "path": workspace.to_string_lossy() })),
        ("setup.get", json!({})),
        ("setup.update", json!({ "section": "attendance", "patch": { "shortageThresholdPercent": 70 } })),
        ("data.seed", json!({ "studentsPerDepartment": 2 })),
        ("records.list", json!({ "collection": "students" })),
        ("records.get", json!({ "collection": "students", "id": "1000" })),
        ("records.upsert", json!({ "collection": "departments", "record": { "name": "MBA", "code": "MBA" } })),
        ("records.delete", json!({ "collection": "departments", "id": "8" })),
        ("marks.record", json!({ "studentId": "1000", "subjectId": "mca-1", "assessmentType": "Internal1", "marksObtained": 18 })),
        ("marks.recordBulk", json!({ "subjectId": "mca-1", "assessmentType": "EndSem", "entries": [{ "studentId": "1000", "marksObtained": 40 }] })),
        ("marks.list", json!({ "studentId": "1000" })),
        ("grading.grade", json!({ "percentage": 72.5 })),
        ("grading.subject", json!({ "internal1": 10, "credits": 3 })),
        ("grading.cgpa", json!({ "subjects": [{ "gradePoint": 8, "credits": 4 }] })),
        ("performance.student", json!({ "studentId": "1000", "semester": 1 })),
        ("performance.department", json!({ "department": "MCA", "semester": 1 })),
        ("attendance.mark", json!({ "date": "2024-07-01", "entries": [{ "studentId": "1000", "status": "present" }] })),
        ("attendance.summary", json!({ "department": "MCA" })),
        ("requests.submit", json!({ "role": "student", "studentId": "1000", "lane": "admin", "field": "name", "newValue": "Aarav K Sharma" })),
        ("requests.list", json!({})),
        ("requests.queue", json!({ "role": "admin2" })),
        ("requests.verify", json!({ "role": "admin2", "id": "missing" })),
        ("requests.approve", json!({ "role": "admin1", "id": "missing" })),
        ("requests.reject", json!({ "role": "staff", "id": "missing" })),
        ("reports.studentCsv", json!({ "studentId": "1000", "outPath": csv_out.to_string_lossy() })),
        ("reports.rosterCsv", json!({ "department": "MCA" })),
        ("backup.export", json!({ "outPath": bundle_out.to_string_lossy() })),
        ("backup.import", json!({ "inPath": bundle_out.to_string_lossy() })),
        ("data.reset", json!({})),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let _ = request(&mut stdin, &mut reader, &(i + 1).to_string(), method, params);
    }

    let unknown = request(&mut stdin, &mut reader, "99", "classes.create", json!({}));
    assert_eq!(unknown["ok"], false);
    assert_eq!(unknown["error"]["code"], "not_implemented");

    assert!(csv_out.is_file());
    assert!(bundle_out.is_file());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_line_gets_bad_json_and_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(v["ok"], false);
    assert_eq!(v["error"]["code"], "bad_json");

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], true);
    assert!(health["result"]["workspacePath"].is_null());

    let no_ws = request(&mut stdin, &mut reader, "2", "records.list", json!({ "collection": "students" }));
    assert_eq!(no_ws["error"]["code"], "no_workspace");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn failed_workspace_select_leaves_no_workspace_selected() {
    let workspace = temp_dir("campusd-select-failure");
    let not_a_dir = workspace.join("plain-file");
    std::fs::write(&not_a_dir, b"x").expect("write file");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let opened = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(opened["ok"], true);

    let failed = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": not_a_dir.to_string_lossy() }),
    );
    assert_eq!(failed["ok"], false);
    assert_eq!(failed["error"]["code"], "io_failed");

    let health = request(&mut stdin, &mut reader, "3", "health", json!({}));
    assert!(health["result"]["workspacePath"].is_null());
    let export = request(
        &mut stdin,
        &mut reader,
        "4",
        "backup.export",
        json!({ "outPath": workspace.join("stale.zip").to_string_lossy() }),
    );
    assert_eq!(export["error"]["code"], "no_workspace");
    assert!(!workspace.join("stale.zip").exists());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
