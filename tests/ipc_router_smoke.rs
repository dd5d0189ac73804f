use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
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
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn health_reports_daemon_shape() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(
        health
            .get("version")
            .and_then(|v| v.as_str())
            .is_some_and(|v| !v.is_empty()),
        "missing version: {}",
        health
    );
    assert!(health.get("backend").is_some_and(|v| v.is_null()));
    assert!(health.get("sectionId").is_some_and(|v| v.is_null()));
    assert_eq!(
        health.get("editState").and_then(|v| v.as_str()),
        Some("viewing")
    );

    let connected = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backend.connect",
        json!({ "mode": "local", "subjects": ["Math"] }),
    );
    assert_eq!(connected.get("backend").and_then(|v| v.as_str()), Some("local"));

    let health = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(health.get("backend").and_then(|v| v.as_str()), Some("local"));
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let value = request(&mut stdin, &mut reader, "1", "schedule.print", json!({}));
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );
}

#[test]
fn malformed_line_yields_bad_json_and_daemon_keeps_serving() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    writeln!(stdin, "this is not json").expect("write garbage");
    stdin.flush().expect("flush garbage");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_json")
    );

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").is_some());
}

#[test]
fn default_block_table_has_breaks_in_place() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let result = request_ok(&mut stdin, &mut reader, "1", "blocks.list", json!({}));
    let blocks = result
        .get("blocks")
        .and_then(|v| v.as_array())
        .expect("blocks array");
    assert_eq!(blocks.len(), 10);
    assert_eq!(blocks[3].get("label").and_then(|v| v.as_str()), Some("Recess"));
    assert_eq!(blocks[3].get("isBreak").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(blocks[7].get("label").and_then(|v| v.as_str()), Some("Lunch"));
    assert_eq!(blocks[7].get("isBreak").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(blocks[0].get("startTime").and_then(|v| v.as_str()), Some("07:00"));
    assert_eq!(blocks[9].get("endTime").and_then(|v| v.as_str()), Some("14:15"));
}

#[test]
fn operations_without_backend_or_section_are_refused() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let value = request(
        &mut stdin,
        &mut reader,
        "1",
        "schedule.open",
        json!({ "sectionId": "sec-1" }),
    );
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some("no_backend")
    );

    let value = request(&mut stdin, &mut reader, "2", "schedule.grid", json!({}));
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some("no_section")
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "backend.connect",
        json!({ "mode": "local", "subjects": ["Math"] }),
    );
    let value = request(&mut stdin, &mut reader, "4", "edit.enter", json!({}));
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some("no_section")
    );
}
