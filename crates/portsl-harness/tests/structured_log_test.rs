//! Integration test: probe runs produce valid JSONL.

use portsl_abi::{HostLinker, ProcMaps};
use portsl_core::{OpenFlags, SharedLibraries, SlConfig};
use portsl_harness::structured_log::{LogEmitter, LogLevel, Outcome, validate_log_file};
use portsl_harness::{SymbolSpec, inventory, probe_library};

fn service() -> SharedLibraries<HostLinker, ProcMaps> {
    SharedLibraries::new(HostLinker, ProcMaps::default()).with_config(SlConfig::default())
}

#[test]
fn emitter_file_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.jsonl");

    let mut emitter = LogEmitter::to_file(&path, "run-1").unwrap();
    emitter.emit(LogLevel::Info, "start").unwrap();
    emitter.emit(LogLevel::Debug, "step").unwrap();
    emitter.emit(LogLevel::Info, "end").unwrap();
    emitter.flush().unwrap();

    let (valid, errors) = validate_log_file(&path).unwrap();
    assert_eq!(valid, 3);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn invalid_lines_are_counted_separately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"timestamp":"2026-10-18T00:00:00.000Z","trace_id":"r::001","level":"info","event":"ok"}"#,
            "\n\n",
            r#"{"timestamp":"2026-10-18T00:00:00.000Z","trace_id":"r::002","level":"loud","event":"bad"}"#,
            "\n",
        ),
    )
    .unwrap();

    let (valid, errors) = validate_log_file(&path).unwrap();
    assert_eq!(valid, 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line_number, 3);
    assert_eq!(errors[0].field, "level");
}

#[cfg(target_os = "linux")]
#[test]
fn probe_of_libc_logs_each_step() {
    let sl = service();
    let symbols: Vec<SymbolSpec> = vec![
        "strlen:pL".parse().unwrap(),
        "portsl_absent_symbol".parse().unwrap(),
    ];
    let mut emitter = LogEmitter::new(Vec::new(), "probe");
    let report = probe_library(&sl, "libc.so.6", OpenFlags::LAZY, &symbols, &mut emitter).unwrap();

    assert_eq!(report.open_code, 0);
    assert_eq!(report.close_code, Some(0));
    assert!(report.symbols[0].found);
    assert!(!report.symbols[1].found);
    assert!(!report.passed());

    let out = String::from_utf8(emitter.into_inner()).unwrap();
    let entries: Vec<_> = out
        .lines()
        .enumerate()
        .map(|(i, line)| portsl_harness::structured_log::validate_log_line(line, i + 1).unwrap())
        .collect();
    let events: Vec<&str> = entries.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(events, ["open", "lookup", "lookup", "close"]);
    assert_eq!(entries[2].outcome, Some(Outcome::Fail));
}

#[cfg(target_os = "linux")]
#[test]
fn probe_of_missing_library_reports_code() {
    let sl = service();
    let mut emitter = LogEmitter::new(Vec::new(), "probe");
    let report = probe_library(
        &sl,
        "/no/such/libportsl-missing.so",
        OpenFlags::empty(),
        &[],
        &mut emitter,
    )
    .unwrap();
    assert_eq!(report.open_code, 1);
    assert!(report.error.is_some());
    assert_eq!(report.close_code, None);
}

#[cfg(target_os = "linux")]
#[test]
fn inventory_of_running_process() {
    let sl = service();
    let inv = inventory::collect(&sl, None).unwrap();
    assert!(!inv.libraries.is_empty());
    assert!(inv.libraries.iter().all(|lib| lib.path.starts_with('/')));

    let limited = inventory::collect(&sl, Some(2)).unwrap();
    assert_eq!(limited.total_regions, 2);
}
