//! ランチャーの実プロセスを使ったテスト。
//!
//! 子の回収を伴うテストはプロセス内で直列化する（`reap_completed` は任意の子を回収するため）。

use std::fs;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use smallsh::command::Command;
use smallsh::config::BackgroundStdio;
use smallsh::executor::{launch, LaunchError, LaunchOutcome};
use smallsh::job::{self, JobTable};
use smallsh::status::Status;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

fn cmd(argv: &[&str]) -> Command {
    Command::new(argv.iter().copied()).unwrap()
}

/// フォアグラウンドで起動し、(結果, StatusRegister, 親側の出力) を返す。
fn run_fg(command: &Command) -> (LaunchOutcome, Status, String) {
    let mut status = Status::default();
    let mut jobs = JobTable::new();
    let mut out = Vec::new();
    let outcome = launch(
        command,
        false,
        BackgroundStdio::Null,
        &mut status,
        &mut jobs,
        &mut out,
    )
    .unwrap();
    assert!(jobs.is_empty());
    (outcome, status, String::from_utf8(out).unwrap())
}

/// 書き込みが常に失敗する stdout（閉じられた端末など）。flush は成功する。
struct BrokenStdout;

impl Write for BrokenStdout {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// テストで起動したバックグラウンドプロセスを終了させて回収する。
fn kill_and_wait(pid: libc::pid_t) {
    unsafe {
        libc::kill(pid, libc::SIGKILL);
        libc::waitpid(pid, std::ptr::null_mut(), 0);
    }
}

// ── フォアグラウンド ──

#[test]
fn true_sets_exit_zero() {
    let _guard = serial();
    let (outcome, status, out) = run_fg(&cmd(&["true"]));
    assert_eq!(outcome, LaunchOutcome::Foreground(Status::Exited(0)));
    assert_eq!(status, Status::Exited(0));
    assert_eq!(out, "");
}

#[test]
fn false_sets_exit_one() {
    let _guard = serial();
    let (_, status, _) = run_fg(&cmd(&["false"]));
    assert_eq!(status, Status::Exited(1));
    assert_eq!(status.render(), "exit value 1");
}

#[test]
fn missing_program_exits_one_and_reports_once() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("out.txt");
    let name = "smallsh-test-no-such-program";
    let command = cmd(&[name]).with_stdout(&log);

    let (_, status, _) = run_fg(&command);
    assert_eq!(status, Status::Exited(1));

    let written = fs::read_to_string(&log).unwrap();
    let expected = format!("{}: no such file or directory\n", name);
    assert_eq!(written, expected);
    assert_eq!(written.matches("no such file or directory").count(), 1);
}

#[test]
fn output_redirect_into_missing_directory_exits_one() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("no-such-dir").join("out.txt");
    let (_, status, _) = run_fg(&cmd(&["echo", "hi"]).with_stdout(&target));
    assert_eq!(status, Status::Exited(1));
    assert!(!target.exists());
}

#[test]
fn missing_input_file_exits_one() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let (_, status, _) = run_fg(&cmd(&["cat"]).with_stdin(dir.path().join("absent")));
    assert_eq!(status, Status::Exited(1));
}

#[test]
fn output_redirect_truncates_and_writes() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.txt");
    fs::write(&target, "old contents that should disappear\n").unwrap();

    let (_, status, _) = run_fg(&cmd(&["echo", "hello"]).with_stdout(&target));
    assert_eq!(status, Status::Exited(0));
    assert_eq!(fs::read_to_string(&target).unwrap(), "hello\n");
}

#[cfg(unix)]
#[test]
fn output_file_is_created_with_mode_0644() {
    use std::os::unix::fs::PermissionsExt;

    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("created.txt");
    run_fg(&cmd(&["true"]).with_stdout(&target));
    let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
    // umask で狭まることはあっても広がることはない
    assert_eq!(mode & !0o644, 0);
}

#[test]
fn input_and_output_redirect_together() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "one\ntwo\nthree\n").unwrap();

    let (_, status, _) = run_fg(&cmd(&["wc", "-l"]).with_stdin(&input).with_stdout(&output));
    assert_eq!(status, Status::Exited(0));
    assert_eq!(fs::read_to_string(&output).unwrap().trim(), "3");
}

#[test]
fn signaled_foreground_is_reported() {
    let _guard = serial();
    let (outcome, status, out) = run_fg(&cmd(&["sh", "-c", "kill -TERM $$"]));
    assert_eq!(outcome, LaunchOutcome::Foreground(Status::Signaled(libc::SIGTERM)));
    assert_eq!(status, Status::Signaled(libc::SIGTERM));
    assert_eq!(out, format!("terminated by signal {}\n", libc::SIGTERM));
    assert_eq!(status.render(), "terminated by signal 15");
}

// ── バックグラウンド ──

#[test]
fn background_launch_returns_immediately_and_tracks_pid() {
    let _guard = serial();
    let mut status = Status::Exited(3);
    let mut jobs = JobTable::new();
    let mut out = Vec::new();

    let command = cmd(&["sleep", "30"]).with_background(true);
    let outcome = launch(
        &command,
        false,
        BackgroundStdio::Null,
        &mut status,
        &mut jobs,
        &mut out,
    )
    .unwrap();

    let LaunchOutcome::Background { pid, tracked } = outcome else {
        panic!("expected background outcome, got {:?}", outcome);
    };
    assert!(tracked);
    assert_eq!(jobs.len(), 1);
    assert!(jobs.contains(pid));
    assert_eq!(String::from_utf8(out).unwrap(), format!("background pid is {}\n", pid));
    // バックグラウンド起動は StatusRegister を変えない
    assert_eq!(status, Status::Exited(3));

    kill_and_wait(pid);
}

#[test]
fn foreground_only_mode_overrides_background_request() {
    let _guard = serial();
    let mut status = Status::Exited(7);
    let mut jobs = JobTable::new();
    let mut out = Vec::new();

    let command = cmd(&["false"]).with_background(true);
    let outcome = launch(
        &command,
        true,
        BackgroundStdio::Null,
        &mut status,
        &mut jobs,
        &mut out,
    )
    .unwrap();

    assert_eq!(outcome, LaunchOutcome::Foreground(Status::Exited(1)));
    assert_eq!(status, Status::Exited(1));
    assert!(jobs.is_empty());
    assert!(out.is_empty());
}

#[test]
fn full_table_runs_job_untracked() {
    let _guard = serial();
    let mut status = Status::default();
    let mut jobs = JobTable::with_capacity(1);
    // 既存エントリ（このテストの子ではない PID）
    let sentinel = i32::MAX - 1;
    jobs.insert(sentinel).unwrap();
    let mut out = Vec::new();

    let command = cmd(&["sleep", "30"]).with_background(true);
    let outcome = launch(
        &command,
        false,
        BackgroundStdio::Null,
        &mut status,
        &mut jobs,
        &mut out,
    )
    .unwrap();

    let LaunchOutcome::Background { pid, tracked } = outcome else {
        panic!("expected background outcome, got {:?}", outcome);
    };
    assert!(!tracked);
    assert_eq!(jobs.iter().collect::<Vec<_>>(), vec![sentinel]);
    // プロセス自体は動いている
    assert_eq!(unsafe { libc::kill(pid, 0) }, 0);

    kill_and_wait(pid);
}

#[test]
fn shutdown_terminates_tracked_jobs() {
    let _guard = serial();
    let mut status = Status::default();
    let mut jobs = JobTable::new();
    let mut out = Vec::new();

    let command = cmd(&["sleep", "30"]).with_background(true);
    let LaunchOutcome::Background { pid, .. } = launch(
        &command,
        false,
        BackgroundStdio::Null,
        &mut status,
        &mut jobs,
        &mut out,
    )
    .unwrap() else {
        panic!("expected background outcome");
    };

    assert_eq!(job::shutdown(&mut jobs), 1);
    assert!(jobs.is_empty());

    let mut raw_status = 0;
    let ret = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
    assert_eq!(ret, pid);
    assert_eq!(Status::from_raw(raw_status), Some(Status::Signaled(libc::SIGTERM)));
}

#[test]
fn background_job_stays_tracked_when_notice_write_fails() {
    let _guard = serial();
    let mut status = Status::Exited(3);
    let mut jobs = JobTable::new();

    let command = cmd(&["sleep", "30"]).with_background(true);
    let result = launch(
        &command,
        false,
        BackgroundStdio::Null,
        &mut status,
        &mut jobs,
        &mut BrokenStdout,
    );
    assert!(matches!(result, Err(LaunchError::Output(_))), "got {:?}", result);

    // 通知は出せなくてもジョブは追跡され、shutdown の対象になる
    assert_eq!(jobs.len(), 1);
    let pid = jobs.iter().next().unwrap();
    assert_eq!(status, Status::Exited(3));
    assert_eq!(job::shutdown(&mut jobs), 1);

    let mut raw_status = 0;
    assert_eq!(unsafe { libc::waitpid(pid, &mut raw_status, 0) }, pid);
    assert_eq!(Status::from_raw(raw_status), Some(Status::Signaled(libc::SIGTERM)));
}

#[test]
fn foreground_status_is_recorded_when_notice_write_fails() {
    let _guard = serial();
    let mut status = Status::default();
    let mut jobs = JobTable::new();

    let result = launch(
        &cmd(&["sh", "-c", "kill -TERM $$"]),
        false,
        BackgroundStdio::Null,
        &mut status,
        &mut jobs,
        &mut BrokenStdout,
    );
    assert!(matches!(result, Err(LaunchError::Output(_))), "got {:?}", result);
    assert_eq!(status, Status::Signaled(libc::SIGTERM));
}
