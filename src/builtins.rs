//! ビルトインコマンドの実装。
//!
//! ビルトインは fork/exec を経由せずシェルプロセス内で直接実行される。
//! リダイレクトと `&` は無視し、常にフォアグラウンドで動く。
//! `try_exec()` が `Some(..)` を返せばビルトインとして処理済み、
//! `None` なら外部コマンドとして executor に委ねる。

use std::env;
use std::io::{self, Write};
use std::path::Path;

use crate::command::Command;
use crate::job;
use crate::shell::Shell;

/// ビルトインコマンドの実行を試みる。
///
/// 戻り値:
/// - `Some(result)` — ビルトインとして実行済み
/// - `None` — 該当するビルトインなし（外部コマンドとして実行すべき）
pub fn try_exec<W: Write>(shell: &mut Shell, cmd: &Command, out: &mut W) -> Option<io::Result<()>> {
    let args = cmd.argv();
    match args[0].as_str() {
        "exit" => {
            builtin_exit(shell);
            Some(Ok(()))
        }
        "cd" => {
            builtin_cd(args);
            Some(Ok(()))
        }
        "status" => Some(builtin_status(shell, out)),
        _ => None,
    }
}

/// `exit` — 残ったバックグラウンドジョブに SIGTERM を送り、REPL ループを終了させる。
fn builtin_exit(shell: &mut Shell) {
    let killed = job::shutdown(&mut shell.jobs);
    tracing::debug!(killed, "exit: background jobs terminated");
    shell.should_exit = true;
}

/// `cd [dir]` — カレントディレクトリを変更する。引数省略時は `$HOME` に移動。
///
/// StatusRegister は変更しない。
fn builtin_cd(args: &[String]) {
    let target = match args.get(1) {
        Some(dir) => dir.clone(),
        None => match env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                eprintln!("cd: HOME not set");
                return;
            }
        },
    };

    if let Err(e) = env::set_current_dir(Path::new(&target)) {
        eprintln!("cd: {}: {}", target, e);
    }
}

/// `status` — 直前のフォアグラウンドコマンドの終了ステータスを表示する。
fn builtin_status<W: Write>(shell: &Shell, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", shell.status.render())?;
    out.flush()
}

