//! Terminal lifecycle: raw mode, ANSI feature enables, signal handlers and
//! the idempotent restore path.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::tty::IsTty;
use crossterm::{cursor, execute};

use crate::cell::ansi;
use crate::error::Result;
use crate::geometry::Size;

/// Worst-case size of one raw input batch.
pub const RAW_INPUT_CAPACITY: usize = 2 * 256;

static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);
static TERMINATE_PENDING: AtomicBool = AtomicBool::new(false);

/// Consume the pending-resize signal flag.
pub fn take_resize_flag() -> bool {
    RESIZE_PENDING.swap(false, Ordering::Relaxed)
}

/// Whether a fatal signal requested termination.
pub fn terminate_requested() -> bool {
    TERMINATE_PENDING.load(Ordering::Relaxed)
}

/// Request termination from inside the process, as the signal path would.
pub fn request_terminate() {
    TERMINATE_PENDING.store(true, Ordering::Relaxed);
}

/// Which terminal features this process actually enabled, so that cleanup
/// disables exactly those and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlatformState {
    /// Platform setup ran.
    pub initialized: bool,
    /// Raw mode (no echo, no canonical buffering) is active.
    pub raw_mode: bool,
    /// SGR mouse-all-events reporting is active.
    pub mouse_reporting: bool,
    /// The cursor is hidden.
    pub cursor_hidden: bool,
    /// The alternate screen buffer is active.
    pub screen_capture: bool,
}

/// Owns terminal state for the lifetime of the engine.
pub struct TerminalSession {
    /// Enabled-feature tracking.
    pub state: PlatformState,
    stdin_is_tty: bool,
    cleanup_callbacks: Vec<Box<dyn FnOnce() + Send>>,
    cleaned_up: bool,
}

impl std::fmt::Debug for TerminalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("state", &self.state)
            .field("stdin_is_tty", &self.stdin_is_tty)
            .field("cleanup_callbacks", &self.cleanup_callbacks.len())
            .finish()
    }
}

impl Default for TerminalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSession {
    /// Create a session, detecting whether stdin is a terminal.
    pub fn new() -> Self {
        Self {
            state: PlatformState::default(),
            stdin_is_tty: io::stdin().is_tty(),
            cleanup_callbacks: Vec::new(),
            cleaned_up: false,
        }
    }

    /// Whether stdin is a terminal. When it is not, raw mode is skipped and
    /// the input thread only reads after poll signals readable bytes.
    pub fn stdin_is_tty(&self) -> bool {
        self.stdin_is_tty
    }

    /// Current terminal extents.
    pub fn size(&self) -> Result<Size> {
        let (w, h) = terminal::size()?;
        Ok(Size::new(u32::from(w), u32::from(h)))
    }

    /// Enter raw mode, enable mouse reporting, hide the cursor and switch
    /// to the alternate screen. Installs the resize and fatal-signal
    /// handlers.
    pub fn init(&mut self) -> Result<()> {
        if self.state.initialized {
            return Ok(());
        }
        let mut stdout = io::stdout();

        execute!(stdout, EnableMouseCapture)?;
        self.state.mouse_reporting = true;
        execute!(stdout, cursor::Hide)?;
        self.state.cursor_hidden = true;
        execute!(stdout, EnterAlternateScreen)?;
        self.state.screen_capture = true;

        if self.stdin_is_tty {
            terminal::enable_raw_mode()?;
            self.state.raw_mode = true;
        }

        install_signal_handlers();

        self.state.initialized = true;
        Ok(())
    }

    /// Register a callback to run at the start of cleanup, while the
    /// terminal state is still live.
    pub fn register_cleanup(&mut self, callback: Box<dyn FnOnce() + Send>) {
        self.cleanup_callbacks.push(callback);
    }

    /// Restore the terminal. Symmetric to [`Self::init`]: only features
    /// that were actually enabled are disabled, and repeated calls are
    /// no-ops.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        for callback in self.cleanup_callbacks.drain(..) {
            callback();
        }

        let mut stdout = io::stdout();
        let _ = stdout.write_all(ansi::RESET_COLOR.as_bytes());

        if self.state.raw_mode {
            let _ = terminal::disable_raw_mode();
            self.state.raw_mode = false;
        }
        if self.state.screen_capture {
            let _ = execute!(stdout, LeaveAlternateScreen);
            self.state.screen_capture = false;
        }
        if self.state.cursor_hidden {
            let _ = execute!(stdout, cursor::Show);
            self.state.cursor_hidden = false;
        }
        if self.state.mouse_reporting {
            let _ = execute!(stdout, DisableMouseCapture);
            self.state.mouse_reporting = false;
        }
        let _ = stdout.flush();
        self.state.initialized = false;
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(unix)]
extern "C" fn on_resize_signal(_signal: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::Relaxed);
}

#[cfg(unix)]
extern "C" fn on_fatal_signal(_signal: libc::c_int) {
    TERMINATE_PENDING.store(true, Ordering::Relaxed);
}

/// Install SIGWINCH and the fatal-signal exit path. The handlers only flip
/// async-signal-safe flags; the worker threads act on them.
#[cfg(unix)]
fn install_signal_handlers() {
    // Safety: sigaction with a handler that only stores to atomics.
    unsafe {
        let mut resize: libc::sigaction = std::mem::zeroed();
        resize.sa_sigaction = on_resize_signal as usize;
        libc::sigemptyset(&mut resize.sa_mask);
        libc::sigaction(libc::SIGWINCH, &resize, std::ptr::null_mut());

        let mut fatal: libc::sigaction = std::mem::zeroed();
        fatal.sa_sigaction = on_fatal_signal as usize;
        libc::sigemptyset(&mut fatal.sa_mask);
        for signal in [
            libc::SIGINT,
            libc::SIGTERM,
            libc::SIGILL,
            libc::SIGFPE,
            libc::SIGABRT,
            libc::SIGSEGV,
        ] {
            libc::sigaction(signal, &fatal, std::ptr::null_mut());
        }
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

/// Block for one batch of raw terminal bytes.
///
/// On a TTY this is a plain blocking read. When stdin is not a terminal the
/// read is guarded by a one-second poll so redirected or closed stdin does
/// not busy-spin on EOF. Returns the number of bytes read, zero on timeout
/// or EOF.
#[cfg(unix)]
pub fn read_terminal_input(buffer: &mut [u8], stdin_is_tty: bool) -> usize {
    if !stdin_is_tty {
        let mut poll_fd = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        // Safety: poll on a valid fd with a one-entry array.
        let ready = unsafe { libc::poll(&mut poll_fd, 1, 1000) };
        if ready <= 0 {
            return 0;
        }
    }
    // Safety: read into a buffer we own, bounded by its length.
    let count = unsafe {
        libc::read(
            libc::STDIN_FILENO,
            buffer.as_mut_ptr().cast::<libc::c_void>(),
            buffer.len(),
        )
    };
    if count <= 0 { 0 } else { count as usize }
}

/// Fallback read for non-unix targets.
#[cfg(not(unix))]
pub fn read_terminal_input(buffer: &mut [u8], _stdin_is_tty: bool) -> usize {
    use std::io::Read;
    io::stdin().read(buffer).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_flag_is_consumed() {
        RESIZE_PENDING.store(true, Ordering::Relaxed);
        assert!(take_resize_flag());
        assert!(!take_resize_flag());
    }

    #[test]
    fn terminate_request_observed() {
        request_terminate();
        assert!(terminate_requested());
    }

    #[test]
    fn cleanup_without_init_is_safe() {
        let mut session = TerminalSession::new();
        session.cleanup();
        session.cleanup();
        assert!(!session.state.initialized);
    }

    #[test]
    fn cleanup_runs_registered_callbacks() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicUsize;

        let mut session = TerminalSession::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        session.register_cleanup(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        session.cleanup();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // A second cleanup must not re-run callbacks.
        session.cleanup();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
