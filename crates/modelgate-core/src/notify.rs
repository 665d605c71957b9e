//! User-visible notices raised by the session core.
//!
//! The core decides *when* to tell the user something; how it is shown
//! (dialog, terminal line, log entry) belongs to whoever implements
//! `Notifier`.

use std::fmt;
use std::sync::Mutex;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// An authenticated request was rejected with 401
    SessionExpired,
    /// The target route needs a role the user does not have
    AccessDenied,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::SessionExpired => "Your session has expired. Please log in again.",
            Notice::AccessDenied => "Access denied: Admins only.",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Emits notices as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        warn!(?notice, "{}", notice.message());
    }
}

/// Keeps every notice in order, for tests and for front-ends that poll.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, notice: Notice) -> usize {
        self.notices().iter().filter(|n| **n == notice).count()
    }

}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
    }
}
