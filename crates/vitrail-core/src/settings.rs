//! Process-wide runtime settings.
//!
//! Settings are populated once at startup (normally from the CLI surface)
//! and handed to the engine. The gamma-correction switch is additionally
//! mirrored into an atomic so that color interpolation can consult it
//! without threading the settings struct through every call.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default click-versus-press threshold in milliseconds.
pub const DEFAULT_MOUSE_PRESS_DOWN_COOLDOWN_MS: u64 = 365;

/// How long an auto-inserted log window stays in the tree.
pub const DEFAULT_LOG_WINDOW_LIFETIME_MS: u64 = 30_000;

static GAMMA_CORRECTION: AtomicBool = AtomicBool::new(false);

/// Runtime configuration consumed by the engine core.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Milliseconds a mouse button must stay down before a press event is
    /// synthesized instead of a click.
    pub mouse_press_down_cooldown_ms: u64,
    /// When enabled, rows are not terminated with `\n` in the encoder and
    /// the terminal is left to wrap the single output line itself.
    pub word_wrapping: bool,
    /// Select gamma-corrected color interpolation instead of the fast
    /// fixed-point path.
    pub enable_gamma_correction: bool,
    /// Select the alternate output backend. The core only carries the flag.
    pub enable_drm: bool,
    /// Log file target, when given on the command line.
    pub logger_file_name: Option<PathBuf>,
    /// Lifetime of the auto-inserted error log window.
    pub log_window_lifetime_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mouse_press_down_cooldown_ms: DEFAULT_MOUSE_PRESS_DOWN_COOLDOWN_MS,
            word_wrapping: false,
            enable_gamma_correction: false,
            enable_drm: false,
            logger_file_name: None,
            log_window_lifetime_ms: DEFAULT_LOG_WINDOW_LIFETIME_MS,
        }
    }
}

impl Settings {
    /// Publish the process-wide pieces of this configuration.
    pub fn apply_process_wide(&self) {
        GAMMA_CORRECTION.store(self.enable_gamma_correction, Ordering::Relaxed);
    }
}

/// Whether color interpolation should run in gamma-corrected space.
pub fn gamma_correction_enabled() -> bool {
    GAMMA_CORRECTION.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(
            s.mouse_press_down_cooldown_ms,
            DEFAULT_MOUSE_PRESS_DOWN_COOLDOWN_MS
        );
        assert!(!s.word_wrapping);
        assert!(!s.enable_drm);
        assert!(s.logger_file_name.is_none());
    }

    #[test]
    fn gamma_flag_round_trips() {
        let mut s = Settings::default();
        s.enable_gamma_correction = true;
        s.apply_process_wide();
        assert!(gamma_correction_enabled());
        s.enable_gamma_correction = false;
        s.apply_process_wide();
        assert!(!gamma_correction_enabled());
    }
}
