//! シェルプロセスのシグナル設定と foreground-only モード。
//!
//! - SIGINT: シェル自身は無視する（プロンプトで Ctrl+C を押してもシェルは死なない）。
//!   フォアグラウンドの子は exec 前に [`reset_to_default`] で `SIG_DFL` に戻す。
//! - SIGTSTP: [`handle_sigtstp`] で foreground-only モードをトグルし、固定文字列を
//!   `write(2)` で stdout に出す。ハンドラ内ではアロケーションもロックも行わない。
//!
//! foreground-only モードはハンドラから書き換えられる唯一の状態なので、
//! プロセス全体で 1 つの [`AtomicBool`] に置く。

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// foreground-only モードのフラグ。SIGTSTP ハンドラだけが書き換える。
static FOREGROUND_ONLY: AtomicBool = AtomicBool::new(false);

const ENTER_NOTICE: &[u8] = b"\nEntering foreground-only mode (& is now ignored)\n";
const EXIT_NOTICE: &[u8] = b"\nExiting foreground-only mode\n";

/// シグナル設定の失敗。起動時にのみ発生する。
#[derive(Debug, thiserror::Error)]
#[error("cannot install handler for {signal}: {source}")]
pub struct SignalError {
    pub signal: &'static str,
    #[source]
    pub source: io::Error,
}

/// シェルのシグナル設定を所有し、foreground-only モードを問い合わせる。
pub struct SignalController {
    flag: &'static AtomicBool,
}

impl SignalController {
    /// SIGINT を無視、SIGTSTP をトグルハンドラに設定する。シェル起動時に 1 回呼ぶ。
    pub fn install() -> Result<Self, SignalError> {
        set_disposition(libc::SIGINT, libc::SIG_IGN, 0, "SIGINT")?;
        // SA_RESTART: プロンプトの read やフォアグラウンド待機を EINTR で中断させない
        set_disposition(
            libc::SIGTSTP,
            handle_sigtstp as extern "C" fn(libc::c_int) as libc::sighandler_t,
            libc::SA_RESTART,
            "SIGTSTP",
        )?;
        tracing::debug!("signal dispositions installed");
        Ok(Self {
            flag: &FOREGROUND_ONLY,
        })
    }

    /// `&` を受け付けない foreground-only モード中なら `true`。
    pub fn is_foreground_only(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// `sigaction` でシグナルの処理方法を設定する。ハンドラ実行中は全シグナルをブロック。
fn set_disposition(
    signo: libc::c_int,
    handler: libc::sighandler_t,
    flags: libc::c_int,
    name: &'static str,
) -> Result<(), SignalError> {
    let ret = unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler;
        libc::sigfillset(&mut action.sa_mask);
        action.sa_flags = flags;
        libc::sigaction(signo, &action, std::ptr::null_mut())
    };
    if ret != 0 {
        return Err(SignalError {
            signal: name,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// fork 後の子プロセスでシグナルを `SIG_DFL` に戻す。
///
/// async-signal-safe な `sigaction` のみを使う。失敗しても子は exec を続行する。
pub(crate) fn reset_to_default(signo: libc::c_int) {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = libc::SIG_DFL;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(signo, &action, std::ptr::null_mut());
    }
}

extern "C" fn handle_sigtstp(_signo: libc::c_int) {
    toggle(&FOREGROUND_ONLY, libc::STDOUT_FILENO);
}

/// フラグを反転し、対応する通知を `fd` に書く。反転後の値を返す。
///
/// 単一ワードのアトミック操作と `write(2)` だけで構成され、シグナルハンドラから呼べる。
/// 割り込まれた側が直後に読む errno は `write(2)` の失敗で書き換えず、元に戻す。
pub fn toggle(flag: &AtomicBool, fd: libc::c_int) -> bool {
    let was_on = flag.fetch_xor(true, Ordering::SeqCst);
    let notice = if was_on { EXIT_NOTICE } else { ENTER_NOTICE };
    unsafe {
        let errno = errno_location();
        let saved = *errno;
        libc::write(fd, notice.as_ptr() as *const libc::c_void, notice.len());
        *errno = saved;
    }
    !was_on
}

// ── errno ──

#[cfg(any(target_os = "linux", target_os = "emscripten"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(any(target_os = "android", target_os = "netbsd", target_os = "openbsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno()
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}
