//! バックグラウンドジョブの追跡と回収。
//!
//! [`JobTable`] は容量上限付きの PID 集合。満杯時は新しい PID を登録せず
//! （既存エントリを上書きしない）、プロセス自体は実行を続ける。
//! [`reap_completed`] はプロンプト毎に `waitpid(-1, WNOHANG)` で終了済みの子を回収し、
//! [`shutdown`] は `exit` 時に残ったジョブへ SIGTERM を送る。

use std::io::{self, Write};

use libc::pid_t;

use crate::status::Status;

/// 参照実装と同じデフォルト容量。
pub const DEFAULT_CAPACITY: usize = 16;

// ── JobTable ─────────────────────────────────────────────────────────

/// [`JobTable::insert`] が PID を登録できなかった理由。
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("job table is full ({capacity} entries)")]
    Full { capacity: usize },
    #[error("pid {0} is already tracked")]
    Duplicate(pid_t),
}

/// 実行中のバックグラウンド PID の集合。
///
/// テーブル内の PID はまだ reap されていないことが保証される。
#[derive(Debug)]
pub struct JobTable {
    pids: Vec<pid_t>,
    capacity: usize,
}

impl JobTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// 容量 `capacity` のテーブルを作る。0 は 1 に切り上げる。
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pids: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// PID を登録する。満杯・重複時はテーブルを変更せずにエラーを返す。
    pub fn insert(&mut self, pid: pid_t) -> Result<(), InsertError> {
        if self.contains(pid) {
            return Err(InsertError::Duplicate(pid));
        }
        if self.is_full() {
            return Err(InsertError::Full {
                capacity: self.capacity,
            });
        }
        self.pids.push(pid);
        Ok(())
    }

    /// PID を削除する。登録されていれば `true`。
    pub fn remove(&mut self, pid: pid_t) -> bool {
        match self.pids.iter().position(|&p| p == pid) {
            Some(idx) => {
                self.pids.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, pid: pid_t) -> bool {
        self.pids.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pids.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 登録済み PID のイテレータ（順序は不定）。
    pub fn iter(&self) -> impl Iterator<Item = pid_t> + '_ {
        self.pids.iter().copied()
    }

    /// 全エントリを取り出してテーブルを空にする。
    fn drain(&mut self) -> Vec<pid_t> {
        std::mem::take(&mut self.pids)
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

// ── Reaper ───────────────────────────────────────────────────────────

/// 回収したバックグラウンドプロセス 1 つぶんの報告。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapedJob {
    pub pid: pid_t,
    pub outcome: Status,
}

impl ReapedJob {
    /// 完了通知の 1 行（改行なし）。
    pub fn notice(&self) -> String {
        match self.outcome {
            Status::Exited(code) => {
                format!("background pid {} is done: exit status {}", self.pid, code)
            }
            Status::Signaled(sig) => format!(
                "background pid {} is done: terminated by signal {}",
                self.pid, sig
            ),
        }
    }
}

/// 完了通知の書き込みに失敗した。回収とテーブルからの削除は済んでいる。
#[derive(Debug, thiserror::Error)]
#[error("cannot report {} finished background job(s): {source}", .reaped.len())]
pub struct ReapError {
    /// 回収済みのジョブ（通知は届いていない可能性がある）。
    pub reaped: Vec<ReapedJob>,
    #[source]
    pub source: io::Error,
}

/// 状態が変化した子プロセスをブロックせずにすべて回収する。
///
/// `waitpid(-1, WNOHANG)` を回収できる子がなくなるまで繰り返してテーブルから削除し、
/// その後で完了通知をまとめて `out` に書く。テーブル未登録の子
/// （満杯で追跡できなかったジョブ）も同様に報告する。
/// StatusRegister は更新しない。
///
/// フォアグラウンド待機は特定 PID を対象に完了まで戻らないため、
/// この関数と同時に同じ子を奪い合うことはない。
pub fn reap_completed<W: Write>(jobs: &mut JobTable, out: &mut W) -> Result<Vec<ReapedJob>, ReapError> {
    let reaped = collect_finished(jobs);
    match write_notices(&reaped, out) {
        Ok(()) => Ok(reaped),
        Err(source) => Err(ReapError { reaped, source }),
    }
}

fn write_notices<W: Write>(reaped: &[ReapedJob], out: &mut W) -> io::Result<()> {
    for job in reaped {
        writeln!(out, "{}", job.notice())?;
    }
    out.flush()
}

fn collect_finished(jobs: &mut JobTable) -> Vec<ReapedJob> {
    let mut reaped = Vec::new();
    loop {
        let mut raw_status: i32 = 0;
        let pid = unsafe { libc::waitpid(-1, &mut raw_status, libc::WNOHANG) };

        // 0: 状態変化なし / -1: 子なし (ECHILD)
        if pid <= 0 {
            break;
        }

        let Some(outcome) = Status::from_raw(raw_status) else {
            continue;
        };
        let job = ReapedJob { pid, outcome };
        if !jobs.remove(pid) {
            tracing::debug!(pid, "reaped a background child that was not tracked");
        }
        reaped.push(job);
    }
    reaped
}

// ── Shutdown ─────────────────────────────────────────────────────────

/// 追跡中の全ジョブに SIGTERM を送り、テーブルを空にする。送信した数を返す。
///
/// 終了は待たない。ジョブがさらに生んだ孫プロセスはシェル終了後も残りうる。
pub fn shutdown(jobs: &mut JobTable) -> usize {
    let pids = jobs.drain();
    for &pid in &pids {
        let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
        if ret != 0 {
            tracing::debug!(pid, error = %io::Error::last_os_error(), "kill failed");
        } else {
            tracing::debug!(pid, "sent SIGTERM to background job");
        }
    }
    pids.len()
}
