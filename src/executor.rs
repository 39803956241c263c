//! 外部コマンドの起動と親プロセス側のスケジューリング。
//!
//! - [`execute`]: ビルトイン判定 → ビルトイン実行 or [`launch`]
//! - [`launch`]: [`spawn::fork_exec`] で子を起動し、
//!   - foreground: その PID だけを `waitpid` で待ち、StatusRegister を更新
//!   - background: 即座に `WNOHANG` で確認してジョブテーブルに登録し、`background pid is N` を表示
//! - foreground-only モード中は `&` 付きコマンドもフォアグラウンドで実行する。
//! - ジョブテーブルが満杯でもプロセスは走らせ続け、PID を追跡しないだけ（kill はしない）。

use std::io::{self, Write};

use libc::pid_t;

use crate::builtins;
use crate::command::Command;
use crate::config::BackgroundStdio;
use crate::job::{JobTable, ReapedJob};
use crate::shell::Shell;
use crate::spawn::{self, ChildPlan, InteriorNul};
use crate::status::Status;

/// [`launch`] の結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// フォアグラウンドで完了した。StatusRegister にも同じ値が入っている。
    Foreground(Status),
    /// バックグラウンドで起動した。`tracked` はジョブテーブルに登録できたか。
    Background { pid: pid_t, tracked: bool },
}

/// 起動の失敗。
///
/// `Output` 以外ではシェルの状態は変更されない。`Output` は子の起動と
/// StatusRegister / ジョブテーブルの更新が済んだ後の通知の書き込み失敗。
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),
    #[error(transparent)]
    InvalidArgument(#[from] InteriorNul),
    #[error("waitpid({pid}) failed: {source}")]
    Wait {
        pid: pid_t,
        #[source]
        source: io::Error,
    },
    #[error("cannot write to stdout: {0}")]
    Output(#[from] io::Error),
}

/// 1 コマンドを実行する。ビルトインならシェル内で、それ以外は [`launch`] で起動する。
pub fn execute<W: Write>(shell: &mut Shell, cmd: &Command, out: &mut W) -> Result<(), LaunchError> {
    if let Some(result) = builtins::try_exec(shell, cmd, out) {
        return Ok(result?);
    }
    let is_foreground_only = shell.is_foreground_only();
    launch(
        cmd,
        is_foreground_only,
        shell.config.background_stdio,
        &mut shell.status,
        &mut shell.jobs,
        out,
    )?;
    Ok(())
}

/// コマンドを子プロセスとして起動する。
///
/// 子側のリダイレクト失敗・exec 失敗は子の終了ステータス 1 として現れ、
/// foreground ならそのまま StatusRegister に入る。親側の通知は `out` に書く。
pub fn launch<W: Write>(
    cmd: &Command,
    is_foreground_only: bool,
    background_stdio: BackgroundStdio,
    status: &mut Status,
    jobs: &mut JobTable,
    out: &mut W,
) -> Result<LaunchOutcome, LaunchError> {
    let background = cmd.background() && !is_foreground_only;
    let plan = ChildPlan::prepare(cmd, background, background_stdio == BackgroundStdio::Null)?;

    // 子の出力より先にシェル側のバッファを吐き出しておく
    out.flush()?;
    let pid = spawn::fork_exec(&plan).map_err(LaunchError::Fork)?;
    tracing::debug!(pid, program = cmd.program(), background, "forked");

    if !background {
        let outcome = wait_for_fg(pid)?;
        *status = outcome;
        if let Status::Signaled(sig) = outcome {
            writeln!(out, "terminated by signal {}", sig)?;
        }
        out.flush()?;
        return Ok(LaunchOutcome::Foreground(outcome));
    }

    // 表示より先にテーブルを確定させる。書き込みに失敗しても PID は追跡されたまま残る
    let finished = poll_once(pid);
    let tracked = match finished {
        // 起動直後に終わっていた場合はここで回収済みなので、テーブルには入れない
        Some(_) => false,
        None => match jobs.insert(pid) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(pid, error = %e, "background job is running but not tracked");
                false
            }
        },
    };

    writeln!(out, "background pid is {}", pid)?;
    if let Some(outcome) = finished {
        writeln!(out, "{}", ReapedJob { pid, outcome }.notice())?;
    }
    out.flush()?;
    Ok(LaunchOutcome::Background { pid, tracked })
}

/// 指定 PID の終了をブロックして待つ。
///
/// シグナル割り込み（EINTR）は再試行する。停止した子（Ctrl+Z は子では `SIG_DFL`）は
/// SIGCONT で再開して待ち続け、フォアグラウンドを停止状態のまま残さない。
fn wait_for_fg(pid: pid_t) -> Result<Status, LaunchError> {
    loop {
        let mut raw_status: i32 = 0;
        let ret = unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) };

        if ret == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(LaunchError::Wait { pid, source: err });
        }

        if libc::WIFSTOPPED(raw_status) {
            tracing::debug!(pid, "foreground child stopped, resuming");
            unsafe {
                libc::kill(pid, libc::SIGCONT);
            }
            continue;
        }

        if let Some(outcome) = Status::from_raw(raw_status) {
            return Ok(outcome);
        }
    }
}

/// `WNOHANG` で 1 回だけ確認する。既に終了していれば回収して結果を返す。
fn poll_once(pid: pid_t) -> Option<Status> {
    let mut raw_status: i32 = 0;
    let ret = unsafe { libc::waitpid(pid, &mut raw_status, libc::WNOHANG) };
    if ret == pid {
        Status::from_raw(raw_status)
    } else {
        None
    }
}
