//! smallsh — ジョブ制御付きの小さな対話シェル
//!
//! REPLループ: バックグラウンド reap → プロンプト表示 → 1 行読み取り → `$$` 展開
//! → トークナイズ → ビルトイン or 外部コマンド実行 → ループ

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use smallsh::command::Command;
use smallsh::config::Config;
use smallsh::executor;
use smallsh::job;
use smallsh::parser;
use smallsh::shell::Shell;
use smallsh::signals::SignalController;

/// ログは stderr にのみ出す。stdout はシェルの出力専用。
fn init_logging() {
    let filter = env::var("SMALLSH_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    init_logging();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("smallsh: {}", e);
        Config::default()
    });

    // シグナル設定: シェル自体は SIGINT を無視し、SIGTSTP で foreground-only モードを切り替える。
    let signals = match SignalController::install() {
        Ok(signals) => signals,
        Err(e) => {
            eprintln!("smallsh: {}", e);
            process::exit(1);
        }
    };

    let mut shell = Shell::new(config, signals);
    tracing::debug!(pid = shell.pid, "smallsh started");

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    let mut line = String::new();

    while !shell.should_exit {
        // プロンプト前にバックグラウンドジョブを reap し、完了通知を出力
        if let Err(e) = shell.reap(&mut out) {
            eprintln!("smallsh: {}", e);
            // stdout に出せなかった完了通知は stderr に回す
            for job in &e.reaped {
                eprintln!("{}", job.notice());
            }
        }

        if write!(out, "{}", shell.config.prompt)
            .and_then(|_| out.flush())
            .is_err()
        {
            break;
        }

        line.clear();
        match stdin.lock().read_line(&mut line) {
            // EOF (Ctrl+D): `exit` と同じ後始末をして終了
            Ok(0) => {
                if let Some(exit) = Command::new(["exit"]) {
                    if let Err(e) = executor::execute(&mut shell, &exit, &mut out) {
                        eprintln!("smallsh: {}", e);
                    }
                }
                break;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // 不正な UTF-8 はその行だけ捨てる
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                eprintln!("smallsh: {}", e);
                continue;
            }
            Err(e) => {
                eprintln!("smallsh: {}", e);
                break;
            }
        }

        let expanded = parser::expand_pid(line.trim_end_matches('\n'), shell.pid);
        match parser::tokenize(&expanded, shell.is_foreground_only()) {
            Ok(Some(cmd)) => {
                if let Err(e) = executor::execute(&mut shell, &cmd, &mut out) {
                    eprintln!("smallsh: {}", e);
                }
            }
            Ok(None) => {} // 空行・コメント
            Err(e) => eprintln!("smallsh: {}", e),
        }
    }

    // stdout/stdin のエラーで抜けた場合も残ったジョブを終了させる
    let killed = job::shutdown(&mut shell.jobs);
    if killed > 0 {
        tracing::debug!(killed, "background jobs terminated on exit");
    }

    let _ = out.flush();
    process::exit(0);
}
