//! Tracks metadata for a compilation session.

use crate::log;

/// Metadata for a single compilation.
///
/// When the calling program first uses one of the API entry points there is
/// no context yet where the library's code may start to track things.  This
/// struct provides that context.  It is cheap to clone and is threaded
/// through everything that may emit diagnostics.
#[derive(Clone)]
pub struct Session {
    log_enabled: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            log_enabled: log::log_enabled(),
        }
    }

    /// A session that never logs, for callers that requested quiet output.
    pub fn quiet() -> Self {
        Self { log_enabled: false }
    }

    pub fn log_enabled(&self) -> bool {
        self.log_enabled
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
