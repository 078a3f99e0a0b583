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

fn spawn_sidecar(args: &[&str]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_asuippd");
    let mut child = Command::new(exe)
        .args(args)
        .env_remove("ASUIPP_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn asuippd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn send_raw(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    line: &str,
) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");
    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    serde_json::from_str(out.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    send_raw(stdin, reader, &payload.to_string())
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
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "{}", value);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

#[test]
fn health_reports_state_and_errors_are_enveloped() {
    let (_child, mut stdin, mut reader) = spawn_sidecar(&["--tray"]);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["version"], json!(env!("CARGO_PKG_VERSION")));
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["startMinimized"], json!(true));

    let bad = send_raw(&mut stdin, &mut reader, "{not json");
    assert_eq!(bad["ok"], json!(false));
    assert_eq!(bad.pointer("/error/code"), Some(&json!("bad_json")));

    assert_eq!(
        request_err_code(&mut stdin, &mut reader, "2", "no.suchMethod", json!({})),
        "not_implemented"
    );
    assert_eq!(
        request_err_code(&mut stdin, &mut reader, "3", "teachers.list", json!({})),
        "no_workspace"
    );
}

#[test]
fn setup_and_teacher_management() {
    let workspace = temp_dir("asuipp-basics");
    let (_child, mut stdin, mut reader) = spawn_sidecar(&[]);

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["isFirstRun"], json!(true));
    assert!(workspace.join("asuipp.sqlite3").is_file());
    assert!(workspace.join("files").is_dir());

    let done = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.complete",
        json!({
            "fullName": "Иванов Иван Иванович",
            "isHead": true,
            "departmentName": "Информационные технологии транспорта",
            "departmentShortName": "ИТТ",
            "semesterYear": "2024-2025",
            "semesterNumber": 2
        }),
    );
    assert_eq!(done["teacher"]["shortName"], json!("Иванов И.И."));
    assert_eq!(done["settings"]["isFirstRun"], json!(false));
    assert_eq!(done["settings"]["isHead"], json!(true));
    let me = done["teacher"]["teacherId"].as_str().expect("teacherId").to_string();

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "teachers.create",
        json!({ "fullName": "Петрова Анна Алексеевна" }),
    );
    let other_id = other["teacher"]["teacherId"].as_str().expect("teacherId").to_string();
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "4",
            "teachers.create",
            json!({ "fullName": "Петрова Анна Алексеевна" })
        ),
        "bad_params"
    );

    let list = request_ok(&mut stdin, &mut reader, "5", "teachers.list", json!({}));
    let teachers = list["teachers"].as_array().expect("teachers");
    assert_eq!(teachers.len(), 2);
    assert!(teachers
        .iter()
        .any(|t| t["teacherId"] == json!(me) && t["isCurrent"] == json!(true)));
    assert!(teachers.iter().all(|t| t["totalPoints"] == json!(0)));

    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "6",
            "teachers.delete",
            json!({ "teacherId": me })
        ),
        "forbidden"
    );

    let switched = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "session.switch",
        json!({ "teacherId": other_id, "isHead": false }),
    );
    assert_eq!(switched["currentTeacher"]["shortName"], json!("Петрова А.А."));
    assert_eq!(switched["settings"]["isHead"], json!(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "teachers.delete",
        json!({ "teacherId": me }),
    );
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "9",
            "session.switch",
            json!({ "teacherId": me })
        ),
        "not_found"
    );

    let periods = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "periods.getOrCreate",
        json!({ "yearStart": 2024, "semester": 2 }),
    );
    assert_eq!(periods["period"]["displayName"], json!("2024-2025, 2 семестр"));
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "periods.getOrCreate",
        json!({ "yearStart": 2024, "semester": 2 }),
    );
    assert_eq!(again["period"]["periodId"], periods["period"]["periodId"]);
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "12",
            "periods.getOrCreate",
            json!({ "yearStart": 2024, "semester": 3 })
        ),
        "bad_params"
    );

    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "13",
            "reminders.list",
            json!({ "daysAhead": 100000000 })
        ),
        "bad_params"
    );
    let reminders = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "reminders.list",
        json!({ "daysAhead": 3660 }),
    );
    assert!(reminders["reminders"].as_array().expect("reminders").is_empty());

    let health = request_ok(&mut stdin, &mut reader, "15", "health", json!({}));
    assert_eq!(health["isFirstRun"], json!(false));
    assert_eq!(health["startMinimized"], json!(false));
}

#[test]
fn workspace_flag_opens_store_at_startup() {
    let workspace = temp_dir("asuipp-flag");
    let ws = workspace.to_string_lossy().to_string();
    let (_child, mut stdin, mut reader) = spawn_sidecar(&["--workspace", &ws]);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["workspacePath"], json!(ws));
    let settings = request_ok(&mut stdin, &mut reader, "2", "settings.get", json!({}));
    assert_eq!(settings["settings"]["isFirstRun"], json!(true));
    assert!(settings["currentTeacher"].is_null());
}
