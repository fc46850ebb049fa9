// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests of rotating file sets against real directories.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use logmon::{
    Budget, CursorStore, EmitterTarget, FileId, FilePattern, ItemState, LogRtOutcome,
    LogSource, MemoryEmitter, PatternSyntax, ProcessStatus, RotationState, process_logrt,
};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    pattern: FilePattern,
    emitter: MemoryEmitter,
}

impl Fixture {
    fn new(name_pattern: &str, syntax: PatternSyntax) -> Self {
        let dir = TempDir::new().unwrap();
        let pattern =
            FilePattern::parse(&format!("{}/{}", dir.path().display(), name_pattern), syntax)
                .unwrap();
        Self {
            dir,
            pattern,
            emitter: MemoryEmitter::new(),
        }
    }

    fn glob() -> Self {
        Self::new("app.log*", PatternSyntax::Glob)
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn poll(&mut self, state: &RotationState, budget: Budget) -> LogRtOutcome {
        let target = EmitterTarget::new("127.0.0.1", 10051, "web-1", "logrt[app.log*]");
        process_logrt(
            &self.pattern,
            state,
            &LogSource::default(),
            budget,
            &target,
            &mut self.emitter,
        )
        .unwrap()
    }

    fn texts(&self) -> Vec<String> {
        self.emitter.texts().into_iter().map(String::from).collect()
    }
}

fn append(path: &Path, data: &str) {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .unwrap();
    file.write_all(data.as_bytes()).unwrap();
}

fn set_mtime(path: &Path, secs: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

#[test]
fn test_rename_rotation_loses_nothing() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "1\n2\n");

    let first = fx.poll(&RotationState::default(), Budget::unlimited());
    assert_eq!(fx.texts(), vec!["1", "2"]);

    // written just before the rename, only reachable through the rotated file
    append(&log, "3\n");
    fs::rename(&log, fx.path("app.log.1")).unwrap();
    append(&log, "4\n");

    let second = fx.poll(&first.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["1", "2", "3", "4"]);
    assert!(second.state.pending_drain.is_empty());
    assert_eq!(second.state.retired.len(), 1);

    append(&log, "5\n");
    let third = fx.poll(&second.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["1", "2", "3", "4", "5"]);
    assert_eq!(third.status, ProcessStatus::UpToDate);
}

#[test]
fn test_drained_file_not_reactivated() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "a\n");
    let first = fx.poll(&RotationState::default(), Budget::unlimited());

    fs::rename(&log, fx.path("app.log.1")).unwrap();
    let second = fx.poll(&first.state, Budget::unlimited());
    assert!(second.state.active.is_none());
    assert_eq!(second.state.retired.len(), 1);

    // the retired file is the only candidate and is written to again
    append(&fx.path("app.log.1"), "late\n");
    let third = fx.poll(&second.state, Budget::unlimited());
    assert!(third.state.active.is_none());
    assert_eq!(fx.texts(), vec!["a"]);

    append(&log, "b\n");
    let fourth = fx.poll(&third.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["a", "b"]);
    assert_eq!(
        fourth.state.active.as_ref().and_then(|t| t.file_id()),
        Some(FileId::from_path(&log).unwrap())
    );
}

#[test]
fn test_copy_truncate_rereads_from_start() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "before rotation line\n");
    let first = fx.poll(&RotationState::default(), Budget::unlimited());
    let active_id = first.state.active.as_ref().and_then(|t| t.file_id());

    fs::copy(&log, fx.path("app.log.1")).unwrap();
    OpenOptions::new()
        .write(true)
        .open(&log)
        .unwrap()
        .set_len(0)
        .unwrap();
    append(&log, "after\n");

    let second = fx.poll(&first.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["before rotation line", "after"]);
    let active = second.state.active.unwrap();
    assert_eq!(active.file_id(), active_id);
    assert_eq!(active.cursor.size_processed, 6);
    assert!(second.state.pending_drain.is_empty());
}

#[test]
fn test_first_poll_follows_newest_file() {
    let mut fx = Fixture::glob();
    append(&fx.path("app.log.2"), "oldest\n");
    append(&fx.path("app.log.1"), "older\n");
    append(&fx.path("app.log"), "current\n");
    set_mtime(&fx.path("app.log.2"), 1_000);
    set_mtime(&fx.path("app.log.1"), 2_000);
    set_mtime(&fx.path("app.log"), 3_000);

    let outcome = fx.poll(&RotationState::default(), Budget::unlimited());
    assert_eq!(fx.texts(), vec!["current"]);
    assert_eq!(
        outcome.state.active.unwrap().path,
        fx.path("app.log")
    );
}

#[test]
fn test_skip_old_data_applies_to_first_file_only() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "old 1\nold 2\n");

    let first = fx.poll(&RotationState::new(true), Budget::unlimited());
    assert!(fx.texts().is_empty());
    assert!(!first.state.skip_old_data);

    append(&log, "new 1\n");
    fs::rename(&log, fx.path("app.log.1")).unwrap();
    append(&log, "next file\n");

    fx.poll(&first.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["new 1", "next file"]);
}

#[test]
fn test_not_found_keeps_waiting() {
    let mut fx = Fixture::glob();
    let state = RotationState::new(true);

    let first = fx.poll(&state, Budget::unlimited());
    assert_eq!(first.status, ProcessStatus::NotFound);
    assert_eq!(first.state, state);

    append(&fx.path("app.log"), "appeared\n");
    let second = fx.poll(&first.state, Budget::unlimited());
    assert_eq!(second.status, ProcessStatus::UpToDate);
    // skip_old_data still applied when the file finally shows up
    assert!(fx.texts().is_empty());
}

#[test]
fn test_rotated_outside_pattern_is_drained() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "x\n");
    let first = fx.poll(&RotationState::default(), Budget::unlimited());

    append(&log, "y\n");
    fs::rename(&log, fx.path("archived-2024.txt")).unwrap();

    let second = fx.poll(&first.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["x", "y"]);
    assert_eq!(second.status, ProcessStatus::UpToDate);
}

#[test]
fn test_unterminated_last_line_flushed_on_drain() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "done\n");
    let first = fx.poll(&RotationState::default(), Budget::unlimited());

    append(&log, "no newline");
    let second = fx.poll(&first.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["done"]);

    fs::rename(&log, fx.path("app.log.1")).unwrap();
    append(&log, "fresh\n");
    fx.poll(&second.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["done", "no newline", "fresh"]);
}

#[test]
fn test_budget_shared_across_files() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "");
    let first = fx.poll(&RotationState::default(), Budget::unlimited());

    append(&log, "r1\nr2\nr3\n");
    fs::rename(&log, fx.path("app.log.1")).unwrap();
    append(&log, "n1\nn2\n");

    let second = fx.poll(&first.state, Budget::new(100, 4));
    assert_eq!(second.sent, 4);
    assert_eq!(second.status, ProcessStatus::BudgetExhausted);
    assert_eq!(fx.texts(), vec!["r1", "r2", "r3", "n1"]);

    let third = fx.poll(&second.state, Budget::new(100, 4));
    assert_eq!(third.sent, 1);
    assert_eq!(fx.texts(), vec!["r1", "r2", "r3", "n1", "n2"]);
}

#[test]
fn test_regex_pattern_syntax() {
    let mut fx = Fixture::new(r"app\.log(\.\d+)?", PatternSyntax::Regex);
    append(&fx.path("app.log.gz"), "compressed\n");
    append(&fx.path("app.log"), "plain\n");
    set_mtime(&fx.path("app.log"), 1_000);

    let outcome = fx.poll(&RotationState::default(), Budget::unlimited());
    assert_eq!(fx.texts(), vec!["plain"]);
    assert_eq!(outcome.state.active.unwrap().path, fx.path("app.log"));
}

#[test]
fn test_state_survives_restart() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    let state_path = fx.path("state").join("logmon.json");
    append(&log, "1\n");

    {
        let store = CursorStore::open(&state_path).unwrap();
        let outcome = fx.poll(&RotationState::default(), Budget::unlimited());
        store
            .set("logrt[app.log*]", ItemState::Logrt(outcome.state))
            .unwrap();
        store.flush().unwrap();
    }

    append(&log, "2\n");
    fs::rename(&log, fx.path("app.log.1")).unwrap();
    append(&log, "3\n");

    let store = CursorStore::open(&state_path).unwrap();
    let state = store
        .get("logrt[app.log*]")
        .unwrap()
        .and_then(|s| s.as_logrt().cloned())
        .unwrap();
    fx.poll(&state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["1", "2", "3"]);
}

#[test]
fn test_history_not_replayed_when_rotated_without_successor() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&fx.path("app.log.1"), "historical\n");
    set_mtime(&fx.path("app.log.1"), 1_000);
    append(&log, "cur\n");

    let first = fx.poll(&RotationState::default(), Budget::unlimited());
    assert_eq!(fx.texts(), vec!["cur"]);

    // shifted down, the writer has not created app.log yet
    fs::rename(fx.path("app.log.1"), fx.path("app.log.2")).unwrap();
    fs::rename(&log, fx.path("app.log.1")).unwrap();

    let second = fx.poll(&first.state, Budget::unlimited());
    assert!(second.state.active.is_none());
    let third = fx.poll(&second.state, Budget::unlimited());
    assert!(third.state.active.is_none());
    assert_eq!(fx.texts(), vec!["cur"]);

    append(&log, "next\n");
    let fourth = fx.poll(&third.state, Budget::unlimited());
    assert_eq!(fx.texts(), vec!["cur", "next"]);
    assert_eq!(fourth.state.active.unwrap().path, log);
}

#[test]
fn test_deleted_active_file_reports_not_found() {
    let mut fx = Fixture::glob();
    let log = fx.path("app.log");
    append(&log, "only\n");
    let first = fx.poll(&RotationState::default(), Budget::unlimited());

    fs::remove_file(&log).unwrap();
    let second = fx.poll(&first.state, Budget::unlimited());
    assert_eq!(second.status, ProcessStatus::NotFound);
    assert_eq!(second.state, first.state);
    assert_eq!(fx.texts(), vec!["only"]);
}
