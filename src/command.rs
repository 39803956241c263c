//! 実行対象コマンド: トークナイザが 1 行から組み立て、ランチャーが 1 回だけ消費する。

use std::path::{Path, PathBuf};

/// 1 行ぶんのコマンド。リダイレクト記号や `&` は取り除かれた状態で保持する。
///
/// `argv` は空にならない（空行・コメント行はトークナイザで除外される）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
    stdin_source: Option<PathBuf>,
    stdout_sink: Option<PathBuf>,
    background: bool,
}

impl Command {
    /// `argv` からフォアグラウンド・リダイレクトなしのコマンドを作る。`argv` が空なら `None`。
    pub fn new<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            return None;
        }
        Some(Self {
            argv,
            stdin_source: None,
            stdout_sink: None,
            background: false,
        })
    }

    /// `< path` を設定する。
    pub fn with_stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_source = Some(path.into());
        self
    }

    /// `> path` を設定する。
    pub fn with_stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_sink = Some(path.into());
        self
    }

    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// プログラム名（`argv[0]`）。
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn stdin_source(&self) -> Option<&Path> {
        self.stdin_source.as_deref()
    }

    pub fn stdout_sink(&self) -> Option<&Path> {
        self.stdout_sink.as_deref()
    }

    pub fn background(&self) -> bool {
        self.background
    }
}
