//! `$$` 展開とトークナイザ: 入力 1 行から [`Command`] を組み立てる。
//!
//! ## 対応構文
//!
//! - 単語区切り: 空白
//! - リダイレクト: `< file`, `> file`（同種が複数あれば最後が有効）
//! - バックグラウンド実行: 行末の単語 `&`（foreground-only モード中は取り除くだけ）
//! - 変数展開: `$$` → シェルの PID
//! - コメント: 先頭が `#` の行、および空行は無視
//!
//! パイプ、クォート、glob 等は扱わない。

use std::fmt;

use crate::command::Command;

/// 1 行の最大長（バイト）。
pub const MAX_LINE_LEN: usize = 2048;
/// 1 コマンドの最大引数数。
pub const MAX_ARGS: usize = 512;

// ── Error ───────────────────────────────────────────────────────────

/// トークナイズ時に発生しうるエラー。
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// `<` / `>` の後にファイル名がない。
    MissingRedirectTarget(char),
    /// リダイレクトと `&` を除くと単語が残らない。
    EmptyCommand,
    /// 行が [`MAX_LINE_LEN`] を超えた。
    LineTooLong(usize),
    /// 引数が [`MAX_ARGS`] を超えた。
    TooManyArguments(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRedirectTarget(op) => {
                write!(f, "syntax error: missing file name after `{op}`")
            }
            Self::EmptyCommand => write!(f, "syntax error: no command"),
            Self::LineTooLong(len) => {
                write!(f, "line too long ({len} bytes, max {MAX_LINE_LEN})")
            }
            Self::TooManyArguments(n) => {
                write!(f, "too many arguments ({n}, max {MAX_ARGS})")
            }
        }
    }
}

impl std::error::Error for ParseError {}

// ── Expansion ───────────────────────────────────────────────────────

/// `$$` をすべて `pid` の 10 進表記に置換する。単独の `$` はそのまま残す。
pub fn expand_pid(line: &str, pid: u32) -> String {
    if !line.contains("$$") {
        return line.to_string();
    }
    line.replace("$$", &pid.to_string())
}

// ── Tokenizer ───────────────────────────────────────────────────────

/// 1 行をトークナイズして [`Command`] を返す。空行・コメント行は `Ok(None)`。
///
/// 行末の `&` は `foreground_only` が `false` のときだけ background 要求になる。
pub fn tokenize(line: &str, foreground_only: bool) -> Result<Option<Command>, ParseError> {
    if line.len() > MAX_LINE_LEN {
        return Err(ParseError::LineTooLong(line.len()));
    }
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut words: Vec<&str> = trimmed.split_whitespace().collect();

    // 行末の `&` のみが background 指定。途中の `&` は通常の引数。
    let wants_background = words.last() == Some(&"&");
    if wants_background {
        words.pop();
    }

    let mut argv: Vec<&str> = Vec::new();
    let mut stdin_source = None;
    let mut stdout_sink = None;

    let mut iter = words.into_iter();
    while let Some(word) = iter.next() {
        match word {
            "<" => {
                let target = iter.next().ok_or(ParseError::MissingRedirectTarget('<'))?;
                stdin_source = Some(target);
            }
            ">" => {
                let target = iter.next().ok_or(ParseError::MissingRedirectTarget('>'))?;
                stdout_sink = Some(target);
            }
            _ => argv.push(word),
        }
    }

    if argv.len() > MAX_ARGS {
        return Err(ParseError::TooManyArguments(argv.len()));
    }

    let mut cmd = Command::new(argv).ok_or(ParseError::EmptyCommand)?;
    if let Some(path) = stdin_source {
        cmd = cmd.with_stdin(path);
    }
    if let Some(path) = stdout_sink {
        cmd = cmd.with_stdout(path);
    }
    Ok(Some(cmd.with_background(wants_background && !foreground_only)))
}
