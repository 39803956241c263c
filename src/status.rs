//! 直前のフォアグラウンドコマンドの終了ステータス（StatusRegister）。
//!
//! `waitpid` の raw status を [`Status`] にデコードし、`status` ビルトインの
//! 表示文字列を組み立てる。バックグラウンドジョブの終了では更新されない。

use std::fmt;

/// フォアグラウンドコマンドの終了結果。初期値は `Exited(0)`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 正常終了。引数は終了コード（0..=255）。
    Exited(i32),
    /// シグナルで終了。引数はシグナル番号。
    Signaled(i32),
}

impl Default for Status {
    fn default() -> Self {
        Status::Exited(0)
    }
}

impl Status {
    /// `waitpid` の raw status をデコードする。
    ///
    /// 正常終了でもシグナル終了でもない status（停止・再開）は `None`。
    pub fn from_raw(raw_status: i32) -> Option<Self> {
        if libc::WIFEXITED(raw_status) {
            Some(Status::Exited(libc::WEXITSTATUS(raw_status)))
        } else if libc::WIFSIGNALED(raw_status) {
            Some(Status::Signaled(libc::WTERMSIG(raw_status)))
        } else {
            None
        }
    }

    /// `status` ビルトインの表示文字列: `exit value N` / `terminated by signal N`。
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Exited(code) => write!(f, "exit value {}", code),
            Status::Signaled(sig) => write!(f, "terminated by signal {}", sig),
        }
    }
}
