//! smallsh ライブラリ — テスト・ベンチマーク用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//! この `lib.rs` は `tests/` と `benches/bench_main.rs` から
//! ランチャー・リーパー・トークナイザに直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`command`] | 実行対象コマンド（argv、`<`/`>` リダイレクト、background 指定） |
//! | [`parser`] | `$$` 展開とトークナイズ（リダイレクト、末尾 `&`、コメント行） |
//! | [`executor`] | コマンド実行（ビルトイン判定、fork/exec、フォアグラウンド待機、バックグラウンド登録） |
//! | [`spawn`] | 子プロセス側の処理（リダイレクト、SIGINT 復元、`execvp`） |
//! | [`builtins`] | ビルトイン（`exit`, `cd`, `status`） |
//! | [`job`] | ジョブテーブル（容量上限付き PID 集合）、バックグラウンド reap、終了時の SIGTERM |
//! | [`signals`] | シグナル設定（SIGINT 無視、SIGTSTP で foreground-only モード切替） |
//! | [`status`] | 直前のフォアグラウンドコマンドの終了ステータス |
//! | [`shell`] | シェルのセッション状態（ステータス、ジョブテーブル、シグナル、設定） |
//! | [`config`] | TOML 設定ファイル（プロンプト、ジョブ容量、バックグラウンドの標準入出力） |

pub mod builtins;
pub mod command;
pub mod config;
pub mod executor;
pub mod job;
pub mod parser;
pub mod shell;
pub mod signals;
pub mod spawn;
pub mod status;
