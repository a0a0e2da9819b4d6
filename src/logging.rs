//! Browser console logging setup.
//!
//! Every module logs through the `log` facade; in the browser the records are
//! routed to the devtools console. Natively (tests, SSR) no logger is installed
//! and the macros are no-ops.

/// Install the console logger and panic hook. Safe to call more than once.
pub fn init(level: log::Level) {
    #[cfg(feature = "hydrate")]
    {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(level).is_err() {
            log::debug!("console logger already installed");
        }
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = level;
    }
}
