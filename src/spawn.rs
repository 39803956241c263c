//! `fork` + `execvp` による子プロセス起動（子プロセス側の処理）。
//!
//! 子プロセスは「リダイレクト失敗」「プログラムが見つからない」を自分で報告して
//! `_exit(1)` する必要があるため、`posix_spawnp` ではなく fork を使う。
//! fork 後の子ではアロケーションを避けるため、argv・パス・エラーメッセージは
//! すべて親で [`ChildPlan`] として事前に組み立てる。
//!
//! ## 構成
//!
//! | 型 | 役割 |
//! |-----|------|
//! | [`CStringVec`] | argv 用の NULL 終端ポインタ配列 |
//! | [`ChildPlan`] | 子で実行する手順（リダイレクト、SIGINT 復元、exec）の事前計算 |
//! | [`fork_exec`] | fork して子で [`ChildPlan`] を実行し、親に子 PID を返す |

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::command::Command;
use crate::signals;

const DEV_NULL: &str = "/dev/null";

// ── エラー型 ──────────────────────────────────────────────────────

/// 子プロセスに渡せない文字列（内部に NUL を含む）。
#[derive(Debug, thiserror::Error)]
#[error("{0:?}: argument contains an interior NUL byte")]
pub struct InteriorNul(pub String);

fn to_cstring(bytes: &[u8]) -> Result<CString, InteriorNul> {
    CString::new(bytes).map_err(|_| InteriorNul(String::from_utf8_lossy(bytes).into_owned()))
}

// ── CStringVec ────────────────────────────────────────────────────

/// argv 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
struct CStringVec {
    strings: Vec<CString>,
    ptrs: Vec<*const libc::c_char>,
}

impl CStringVec {
    fn from_args(args: &[String]) -> Result<Self, InteriorNul> {
        let strings = args
            .iter()
            .map(|s| to_cstring(s.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut ptrs: Vec<*const libc::c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null()); // NULL 終端
        Ok(Self { strings, ptrs })
    }

    fn program(&self) -> *const libc::c_char {
        self.strings[0].as_ptr()
    }

    fn as_ptr(&self) -> *const *const libc::c_char {
        self.ptrs.as_ptr()
    }
}

// ── ChildPlan ─────────────────────────────────────────────────────

/// 子で開くリダイレクト先。失敗時に出すメッセージも持つ。
struct Redirect {
    path: CString,
    failure: Vec<u8>,
}

impl Redirect {
    fn new(path: &Path, direction: &str) -> Result<Self, InteriorNul> {
        Ok(Self {
            path: to_cstring(path.as_os_str().as_bytes())?,
            failure: format!("cannot open {} for {}\n", path.display(), direction).into_bytes(),
        })
    }
}

/// fork 後の子プロセスが実行する手順。親側で組み立てる。
pub struct ChildPlan {
    argv: CStringVec,
    stdin: Option<Redirect>,
    stdout: Option<Redirect>,
    restore_sigint: bool,
    not_found: Vec<u8>,
}

impl ChildPlan {
    /// `cmd` から子の手順を組み立てる。
    ///
    /// - `background`: 実際にバックグラウンドで走らせるか（foreground-only モード適用後）。
    ///   フォアグラウンドなら子で SIGINT を `SIG_DFL` に戻す。
    /// - `null_stdio`: バックグラウンドでリダイレクト指定のない stdin/stdout を `/dev/null` に繋ぐ。
    pub fn prepare(cmd: &Command, background: bool, null_stdio: bool) -> Result<Self, InteriorNul> {
        let null_default = background && null_stdio;
        let stdin = match cmd.stdin_source() {
            Some(path) => Some(Redirect::new(path, "input")?),
            None if null_default => Some(Redirect::new(Path::new(DEV_NULL), "input")?),
            None => None,
        };
        let stdout = match cmd.stdout_sink() {
            Some(path) => Some(Redirect::new(path, "output")?),
            None if null_default => Some(Redirect::new(Path::new(DEV_NULL), "output")?),
            None => None,
        };
        Ok(Self {
            argv: CStringVec::from_args(cmd.argv())?,
            stdin,
            stdout,
            restore_sigint: !background,
            not_found: format!("{}: no such file or directory\n", cmd.program()).into_bytes(),
        })
    }
}

// ── fork_exec ─────────────────────────────────────────────────────

/// fork して子で `plan` を実行する。親には子の PID を返す。
///
/// fork 自体の失敗（子が存在しない）だけが `Err` になる。子側の失敗は
/// 子の終了ステータス 1 として親の `waitpid` に現れる。
pub fn fork_exec(plan: &ChildPlan) -> io::Result<libc::pid_t> {
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(io::Error::last_os_error());
    }
    if pid == 0 {
        unsafe { run_child(plan) }
    }
    Ok(pid)
}

/// 子プロセス本体。戻らない。
///
/// async-signal-safe な関数（open, dup2, close, sigaction, execvp, write, _exit）のみ使う。
unsafe fn run_child(plan: &ChildPlan) -> ! {
    if let Some(r) = &plan.stdin {
        redirect(r, libc::O_RDONLY, libc::STDIN_FILENO);
    }
    if let Some(r) = &plan.stdout {
        redirect(r, libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC, libc::STDOUT_FILENO);
    }
    if plan.restore_sigint {
        signals::reset_to_default(libc::SIGINT);
    }

    libc::execvp(plan.argv.program(), plan.argv.as_ptr());

    // exec が戻った = 起動失敗
    write_all(libc::STDOUT_FILENO, &plan.not_found);
    libc::_exit(1)
}

/// `r.path` を開いて `target_fd` に複製する。失敗したら報告して `_exit(1)`。
unsafe fn redirect(r: &Redirect, flags: libc::c_int, target_fd: libc::c_int) {
    let fd = libc::open(r.path.as_ptr(), flags, 0o644 as libc::c_uint);
    if fd == -1 {
        write_all(libc::STDOUT_FILENO, &r.failure);
        libc::_exit(1);
    }
    if libc::dup2(fd, target_fd) == -1 {
        write_all(libc::STDERR_FILENO, b"unable to redirect\n");
        libc::_exit(1);
    }
    if fd != target_fd {
        libc::close(fd);
    }
}

/// `write(2)` を全バイト書き終わるまで繰り返す。エラーは無視する（子は直後に終了する）。
unsafe fn write_all(fd: libc::c_int, mut buf: &[u8]) {
    while !buf.is_empty() {
        let n = libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len());
        if n <= 0 {
            return;
        }
        buf = &buf[n as usize..];
    }
}
