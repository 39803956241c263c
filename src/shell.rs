//! シェルのセッション状態を保持するモジュール。
//!
//! StatusRegister、ジョブテーブル、シグナル設定、設定値を 1 つの [`Shell`] にまとめ、
//! REPL ループから参照で渡す。シグナルハンドラが触る foreground-only フラグだけは
//! [`SignalController`] 経由のアトミック変数で、それ以外は単一スレッドの通常の状態。

use std::io::Write;

use crate::config::Config;
use crate::job::{self, JobTable, ReapError, ReapedJob};
use crate::signals::SignalController;
use crate::status::Status;

/// シェルの実行状態。REPLループ全体で共有される。
pub struct Shell {
    /// 直前のフォアグラウンドコマンドの終了結果。`status` ビルトインが表示する。
    pub status: Status,
    /// 追跡中のバックグラウンドジョブ。
    pub jobs: JobTable,
    /// SIGINT/SIGTSTP の設定と foreground-only モード。
    pub signals: SignalController,
    pub config: Config,
    /// シェル自身の PID（`$$` 展開用）。
    pub pid: u32,
    /// `exit` ビルトインで true にセットされ、REPLループを終了させる。
    pub should_exit: bool,
}

impl Shell {
    pub fn new(config: Config, signals: SignalController) -> Self {
        Self {
            status: Status::default(),
            jobs: JobTable::with_capacity(config.job_capacity),
            signals,
            config,
            pid: std::process::id(),
            should_exit: false,
        }
    }

    pub fn is_foreground_only(&self) -> bool {
        self.signals.is_foreground_only()
    }

    /// 終了済みのバックグラウンドジョブを回収して通知する。プロンプト毎に 1 回呼ぶ。
    ///
    /// 通知の書き込みに失敗しても回収は済んでおり、エラーに回収結果が入る。
    pub fn reap<W: Write>(&mut self, out: &mut W) -> Result<Vec<ReapedJob>, ReapError> {
        job::reap_completed(&mut self.jobs, out)
    }
}
