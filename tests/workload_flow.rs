use rust_xlsxwriter::Workbook;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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
    let exe = env!("CARGO_BIN_EXE_asuippd");
    let mut child = Command::new(exe)
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

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
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

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "{}", value);
    value.get("error").cloned().expect("error object")
}

/// Department rubric laid out the way the faculty spreadsheet is: semester
/// header on row 1, roster on row 5, items from row 6.
fn write_rubric(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let text: &[(u32, u16, &str)] = &[
        (0, 4, "2 семестр"),
        (0, 8, "2024-2025"),
        (4, 0, "№"),
        (4, 1, "Виды работ"),
        (4, 2, "Баллы"),
        (4, 3, "Хабаров В.И."),
        (4, 4, "Петрова А.А."),
        (5, 0, "1."),
        (5, 1, "Учебная работа"),
        (6, 0, "1"),
        (6, 1, "Оценка по анкете"),
        (6, 2, "7"),
        (7, 0, "2"),
        (7, 1, "Руководство практикой"),
        (8, 1, "- учебной"),
        (8, 2, "1 балл за 1 практику"),
        (9, 1, "- производственной"),
        (9, 2, "2"),
        (10, 0, "4.1"),
        (10, 1, "Подготовка пособия"),
        (10, 2, "3/5/7"),
        (11, 0, "2."),
        (11, 1, "Научная работа"),
        (12, 0, "1"),
        (12, 1, "Статья ВАК"),
        (12, 2, "8"),
        (13, 0, "2"),
        (13, 1, "Штраф за срыв сроков"),
        (13, 2, "-5"),
        (14, 0, "3."),
        (14, 1, "Воспитательная работа"),
        (15, 0, "1"),
        (15, 1, "Кураторство"),
        (16, 0, "Итого"),
    ];
    for (row, col, value) in text {
        sheet.write_string(*row, *col, *value).expect("write text");
    }
    let numbers: &[(u32, u16, f64)] = &[
        (6, 3, 7.0),
        (8, 3, 3.0),
        (9, 4, 4.0),
        (10, 4, 9.0),
        (12, 3, 28.0),
        (13, 3, -5.0),
        (16, 3, 33.0),
    ];
    for (row, col, value) in numbers {
        sheet.write_number(*row, *col, *value).expect("write number");
    }

    let departments = workbook.add_worksheet();
    departments.set_name("Кафедры").expect("sheet name");
    departments.write_string(0, 0, "Кафедра").expect("header");
    departments
        .write_string(1, 0, "Информационные технологии транспорта")
        .expect("department");
    departments.write_string(1, 1, "ИТТ").expect("short");

    workbook.save(path).expect("save rubric");
}

fn create_work(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    params: serde_json::Value,
) -> String {
    let created = request_ok(stdin, reader, id, "works.create", params);
    created["work"]["workId"].as_str().expect("workId").to_string()
}

#[test]
fn rubric_import_limits_files_reminders_and_reports() {
    let workspace = temp_dir("asuipp-flow");
    let rubric_path = workspace.join("rubric.xlsx");
    write_rubric(&rubric_path);
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let import = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.importWorkbook",
        json!({ "path": rubric_path.to_string_lossy() }),
    );
    assert_eq!(import["sectionsCount"], json!(3));
    assert_eq!(import["workItemsCount"], json!(8));
    assert_eq!(import["teachersCount"], json!(2));
    // 7 | 3 split by cap 1 | 28 split by cap 8 | -5 for the first teacher,
    // 4 split by cap 2 | 9 split by cap 7 for the second.
    assert_eq!(import["scoresCount"], json!(13));
    assert_eq!(import["semesterNumber"], json!(2));
    assert_eq!(import["year"], json!("2024-2025"));
    assert_eq!(import["departments"][0]["shortName"], json!("ИТТ"));
    assert_eq!(import["errors"], json!([]));

    let items = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reference.items",
        json!({ "sectionId": 1 }),
    );
    let ids: Vec<&str> = items["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|i| i["itemId"].as_str().expect("itemId"))
        .collect();
    assert_eq!(ids, vec!["1", "2", "2а", "2б", "4.1"]);
    let item = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reference.item",
        json!({ "sectionId": 1, "itemId": "4.1" }),
    );
    assert_eq!(item["item"]["capDisplay"], json!("макс. 7 (3/5/7)"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.complete",
        json!({ "fullName": "Хабаров В.И.", "shortName": "Хабаров В.И." }),
    );
    let summary = request_ok(&mut stdin, &mut reader, "6", "works.summary", json!({}));
    assert_eq!(summary["sections"][0]["points"], json!(10));
    assert_eq!(summary["sections"][1]["points"], json!(23));
    assert_eq!(summary["effectiveTotal"], json!(33));

    // Importing the same workbook again adds no score works.
    let before = request_ok(&mut stdin, &mut reader, "6a", "works.list", json!({}));
    let reimport = request_ok(
        &mut stdin,
        &mut reader,
        "6b",
        "setup.importWorkbook",
        json!({ "path": rubric_path.to_string_lossy() }),
    );
    assert_eq!(reimport["scoresCount"], json!(0));
    assert_eq!(reimport["workItemsCount"], json!(8));
    let after = request_ok(&mut stdin, &mut reader, "6c", "works.list", json!({}));
    assert_eq!(
        after["works"].as_array().map(|a| a.len()),
        before["works"].as_array().map(|a| a.len())
    );
    let summary = request_ok(&mut stdin, &mut reader, "6d", "works.summary", json!({}));
    assert_eq!(summary["effectiveTotal"], json!(33));

    // Item caps.
    let e = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "works.create",
        json!({ "sectionId": 1, "itemId": "1", "points": 8 }),
    );
    assert_eq!(e["code"], json!("points_exceed_item_cap"));
    let e = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "works.create",
        json!({ "sectionId": 2, "itemId": "2", "points": 3 }),
    );
    assert_eq!(e["code"], json!("points_exceed_item_cap"));

    // Section ceiling.
    let _ = create_work(
        &mut stdin,
        &mut reader,
        "9",
        json!({ "sectionId": 1, "itemId": "4.1", "points": 7 }),
    );
    let e = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "works.create",
        json!({ "sectionId": 1, "itemId": "2", "points": 40 }),
    );
    assert_eq!(e["code"], json!("section_limit_exceeded"));
    assert_eq!(e["details"]["current"], json!(17));
    assert_eq!(e["details"]["available"], json!(33));
    let e = request_err(
        &mut stdin,
        &mut reader,
        "10a",
        "works.create",
        json!({ "sectionId": 1, "itemId": "2", "points": i64::MAX }),
    );
    assert_eq!(e["code"], json!("bad_params"));
    assert_eq!(e["details"]["points"], json!(i64::MAX));
    let _ = create_work(
        &mut stdin,
        &mut reader,
        "11",
        json!({ "sectionId": 1, "itemId": "2", "points": 33, "workName": "Практики весеннего семестра" }),
    );

    // Total ceiling.
    let e = request_err(
        &mut stdin,
        &mut reader,
        "12",
        "works.create",
        json!({ "sectionId": 3, "itemId": "1", "points": 30 }),
    );
    assert_eq!(e["code"], json!("total_limit_exceeded"));
    assert_eq!(e["details"]["current"], json!(73));
    assert_eq!(e["details"]["available"], json!(27));
    let curator = create_work(
        &mut stdin,
        &mut reader,
        "13",
        json!({ "sectionId": 3, "itemId": "1", "points": 27 }),
    );

    // Editing a work does not count its old value against itself.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "works.update",
        json!({ "workId": curator, "points": 27, "workName": "Кураторство группы", "dueDate": "2025-03-01" }),
    );
    assert_eq!(updated["work"]["workName"], json!("Кураторство группы"));
    assert_eq!(updated["work"]["dueDate"], json!("2025-03-01"));
    let summary = request_ok(&mut stdin, &mut reader, "15", "works.summary", json!({}));
    assert_eq!(summary["effectiveTotal"], json!(100));
    assert_eq!(summary["available"], json!(0));

    // Reminders.
    let upcoming = create_work(
        &mut stdin,
        &mut reader,
        "16",
        json!({ "sectionId": 2, "itemId": "2", "points": 0, "dueDate": "2025-03-20" }),
    );
    let reminders = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "reminders.list",
        json!({ "today": "2025-03-10" }),
    );
    let list = reminders["reminders"].as_array().expect("reminders");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["workId"], json!(curator));
    assert_eq!(list[0]["isOverdue"], json!(true));
    assert_eq!(list[0]["daysUntilDue"], json!(-9));
    assert_eq!(list[0]["sectionName"], json!("Воспитательная работа"));
    assert_eq!(list[1]["workId"], json!(upcoming));
    assert_eq!(list[1]["daysUntilDue"], json!(10));
    let count = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "reminders.overdueCount",
        json!({ "today": "2025-03-10" }),
    );
    assert_eq!(count["count"], json!(1));

    // Status cycle.
    let advanced = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "works.advanceStatus",
        json!({ "workId": curator }),
    );
    assert_eq!(advanced["work"]["status"], json!("InProgress"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "20",
        "works.setStatus",
        json!({ "workId": curator, "status": "Reported" }),
    );
    let wrapped = request_ok(
        &mut stdin,
        &mut reader,
        "21",
        "works.advanceStatus",
        json!({ "workId": curator }),
    );
    assert_eq!(wrapped["work"]["status"], json!("Planned"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "22",
        "works.setStatus",
        json!({ "workId": curator, "status": "Done" }),
    );
    let count = request_ok(
        &mut stdin,
        &mut reader,
        "23",
        "reminders.overdueCount",
        json!({ "today": "2025-03-10" }),
    );
    assert_eq!(count["count"], json!(0));

    // Attachments.
    let evidence = workspace.join("приказ.pdf");
    std::fs::write(&evidence, b"%PDF-1.4 test").expect("write evidence");
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "24",
        "files.attach",
        json!({ "workId": curator, "sourcePath": evidence.to_string_lossy() }),
    );
    assert_eq!(first["file"]["fileType"], json!("pdf"));
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "25",
        "files.attach",
        json!({ "workId": curator, "sourcePath": evidence.to_string_lossy() }),
    );
    assert_eq!(second["file"]["fileName"], json!("приказ_1.pdf"));
    let files = request_ok(
        &mut stdin,
        &mut reader,
        "26",
        "files.list",
        json!({ "workId": curator }),
    );
    assert_eq!(files["files"].as_array().map(|a| a.len()), Some(2));
    let first_id = first["file"]["fileId"].as_str().expect("fileId").to_string();
    let located = request_ok(
        &mut stdin,
        &mut reader,
        "27",
        "files.path",
        json!({ "fileId": first_id }),
    );
    assert_eq!(located["exists"], json!(true));
    let stored = PathBuf::from(located["path"].as_str().expect("path"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "28",
        "files.delete",
        json!({ "fileId": first_id }),
    );
    assert!(!stored.exists());

    // Reports.
    let report = request_ok(&mut stdin, &mut reader, "29", "reports.summary", json!({}));
    assert!(Path::new(report["path"].as_str().expect("path")).is_file());
    let personal_path = workspace.join("out").join("personal.xlsx");
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "30",
        "reports.personal",
        json!({ "outPath": personal_path.to_string_lossy() }),
    );
    assert_eq!(report["path"], json!(personal_path.to_string_lossy()));
    assert!(personal_path.is_file());

    // A failed row delete leaves the stored files in place.
    let work_dir = stored.parent().expect("work dir").to_path_buf();
    assert!(work_dir.is_dir());
    let store = rusqlite::Connection::open(workspace.join("asuipp.sqlite3")).expect("open store");
    store
        .execute_batch(
            "CREATE TRIGGER keep_works BEFORE DELETE ON planned_works
             BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .expect("create trigger");
    let e = request_err(
        &mut stdin,
        &mut reader,
        "30a",
        "works.delete",
        json!({ "workId": curator }),
    );
    assert_eq!(e["code"], json!("db_delete_failed"));
    assert!(work_dir.is_dir());
    store
        .execute_batch("DROP TRIGGER keep_works;")
        .expect("drop trigger");
    drop(store);

    // Deleting a work removes its stored files.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "31",
        "works.delete",
        json!({ "workId": curator }),
    );
    assert!(!work_dir.exists());
    let e = request_err(
        &mut stdin,
        &mut reader,
        "32",
        "works.get",
        json!({ "workId": curator }),
    );
    assert_eq!(e["code"], json!("not_found"));
}

#[test]
fn replacing_the_rubric_requires_no_planned_works() {
    let workspace = temp_dir("asuipp-replace");
    let rubric_path = workspace.join("rubric.xlsx");
    write_rubric(&rubric_path);
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.importWorkbook",
        json!({ "path": rubric_path.to_string_lossy(), "replaceRubric": true }),
    );
    assert_eq!(first["workItemsCount"], json!(8));
    assert_eq!(first["scoresCount"], json!(13));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "setup.importWorkbook",
        json!({ "path": rubric_path.to_string_lossy(), "replaceRubric": true }),
    );
    assert_eq!(e["code"], json!("import_failed"));

    let sections = request_ok(&mut stdin, &mut reader, "4", "reference.sections", json!({}));
    assert_eq!(sections["sections"].as_array().map(|a| a.len()), Some(3));
}
