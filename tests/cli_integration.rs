// CLI integration tests for inspect/unpack flows.
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

const MHT_PROGRAM: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/programs/mht.jq");

const ARCHIVE: &str = "MIME-Version: 1.0\n\
Subject: Fixture\n\
Content-Type: multipart/related; boundary=\"BOUNDARY\"\n\
\n\
--BOUNDARY\n\
Content-Type: text/html; charset=\"utf-8\"\n\
Content-ID: <root>\n\
\n\
<html>hello</html>\n\
--BOUNDARY\n\
Content-Type: text/css\n\
Content-Transfer-Encoding: base64\n\
\n\
Ym9keXt9\n\
--BOUNDARY--\n";

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_unmht");
    Command::new(exe)
}

fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("valid json")
}

fn write_archive(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("page.mht");
    std::fs::write(&path, text).expect("write archive");
    path
}

#[test]
fn inspect_prints_summary() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = write_archive(temp.path(), ARCHIVE);

    let output = cmd()
        .args(["inspect", archive.to_str().unwrap(), "--program", MHT_PROGRAM, "--cid"])
        .output()
        .expect("inspect");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let summary = parse_json(&output.stdout);
    assert_eq!(summary["baseReference"], "cid:");
    assert_eq!(summary["title"], "Fixture");
    assert_eq!(summary["entryIndex"], 0);
    let parts = summary["parts"].as_array().expect("parts");
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["mediaType"], "text/html");
    assert_eq!(parts[0]["charset"], "utf-8");
    assert_eq!(parts[0]["contentId"], "<root>");
    assert_eq!(parts[0]["size"], 18);
    assert_eq!(parts[1]["mediaType"], "text/css");
    assert!(parts[1]["contentId"].is_null());
    assert_eq!(parts[1]["size"], 6);
    assert!(parts[0].get("file").is_none());
}

#[test]
fn inspect_without_cid_uses_placeholder_base() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = write_archive(temp.path(), ARCHIVE);

    let output = cmd()
        .args(["inspect", archive.to_str().unwrap(), "--program", MHT_PROGRAM, "--pretty"])
        .output()
        .expect("inspect");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.lines().count() > 1, "pretty output spans lines");
    let summary: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(summary["baseReference"], "http://ql_unmht/");
}

#[test]
fn unpack_writes_each_part() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = write_archive(temp.path(), ARCHIVE);
    let out = temp.path().join("out");

    let output = cmd()
        .args([
            "unpack",
            archive.to_str().unwrap(),
            "--program",
            MHT_PROGRAM,
            "--out",
            out.to_str().unwrap(),
        ])
        .output()
        .expect("unpack");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert_eq!(
        std::fs::read(out.join("part-000")).expect("part 0"),
        b"<html>hello</html>"
    );
    assert_eq!(std::fs::read(out.join("part-001")).expect("part 1"), b"body{}");

    let summary = parse_json(&output.stdout);
    let file = summary["parts"][1]["file"].as_str().expect("file");
    assert!(file.ends_with("part-001"));
}

#[test]
fn missing_entry_part_exits_with_integrity_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = write_archive(temp.path(), ARCHIVE);
    let program = temp.path().join("no-entry.jq");
    std::fs::write(&program, r#"{baseReference: "cid:", title: "t", parts: []}"#)
        .expect("write program");

    let output = cmd()
        .args([
            "inspect",
            archive.to_str().unwrap(),
            "--program",
            program.to_str().unwrap(),
        ])
        .output()
        .expect("inspect");
    assert_eq!(output.status.code(), Some(6));
    assert!(output.stdout.is_empty());
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Integrity");
}

#[test]
fn broken_program_exits_with_collaborator_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = write_archive(temp.path(), ARCHIVE);
    let program = temp.path().join("broken.jq");
    std::fs::write(&program, "{ baseReference: ").expect("write program");

    let output = cmd()
        .args([
            "inspect",
            archive.to_str().unwrap(),
            "--program",
            program.to_str().unwrap(),
        ])
        .output()
        .expect("inspect");
    assert_eq!(output.status.code(), Some(3));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Collaborator");
    assert!(err["error"]["path"].as_str().unwrap().ends_with("page.mht"));
}

#[test]
fn missing_archive_exits_with_io_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd()
        .args([
            "inspect",
            temp.path().join("absent.mht").to_str().unwrap(),
            "--program",
            MHT_PROGRAM,
        ])
        .output()
        .expect("inspect");
    assert_eq!(output.status.code(), Some(7));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Io");
    assert_eq!(err["error"]["message"], "failed to read archive");
}

#[test]
fn print_output_goes_to_stderr() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = write_archive(temp.path(), ARCHIVE);
    let program = temp.path().join("print.jq");
    std::fs::write(
        &program,
        r#"["parsing", ($text | length)] | print | {
            baseReference: "cid:", title: "t",
            parts: [{charset: null, mediaType: null,
                     refParams: {contentId: null, content: "", isEntryPart: true}}]
        }"#,
    )
    .expect("write program");

    let output = cmd()
        .args([
            "inspect",
            archive.to_str().unwrap(),
            "--program",
            program.to_str().unwrap(),
        ])
        .output()
        .expect("inspect");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&format!("parsing {}", ARCHIVE.len())));
    let summary = parse_json(&output.stdout);
    assert_eq!(summary["parts"][0]["size"], 0);
}

#[test]
fn inspect_accepts_crlf_archives() {
    let temp = tempfile::tempdir().expect("tempdir");
    let archive = write_archive(temp.path(), &ARCHIVE.replace('\n', "\r\n"));

    let output = cmd()
        .args(["inspect", archive.to_str().unwrap(), "--program", MHT_PROGRAM])
        .output()
        .expect("inspect");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let summary = parse_json(&output.stdout);
    assert_eq!(summary["title"], "Fixture");
    assert_eq!(summary["parts"][0]["size"], 18);
    assert_eq!(summary["parts"][1]["size"], 6);
}

#[test]
fn missing_program_names_the_flag() {
    let output = cmd().args(["inspect", "page.mht"]).output().expect("inspect");
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(err["error"]["message"].as_str().unwrap().contains("--program"));
    assert!(err["error"]["hint"].as_str().unwrap().contains("unmht inspect"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let output = cmd()
        .args(["inspect", "page.mht", "--program", "x.jq", "--bogus"])
        .output()
        .expect("inspect");
    assert_eq!(output.status.code(), Some(2));
    let err = parse_json(&output.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
}
