//! Runner state machine.
//!
//! [`RunnerState`] is never stored; a [`Runner`](super::Runner) derives it
//! from whether its capture thread is still alive and whether the active
//! flag is set.
//!
//! ```text
//! Idle ──start()──▶ Running ──stop()──────────────────▶ Idle
//!                      │
//!                      └─ loop ends on its own ─▶ Stopping ──thread exits──▶ Idle
//! ```

/// Lifecycle phase of a [`Runner`](super::Runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerState {
    /// No capture thread is alive.
    #[default]
    Idle,

    /// The capture thread is listening.
    Running,

    /// The active flag is cleared but the capture thread has not exited
    /// yet.
    Stopping,
}

impl RunnerState {
    /// Derive the state from the runner's fields.
    pub(crate) fn derive(worker_alive: bool, active: bool) -> Self {
        match (worker_alive, active) {
            (false, _) => RunnerState::Idle,
            (true, true) => RunnerState::Running,
            (true, false) => RunnerState::Stopping,
        }
    }

    /// A short human-readable label.
    ///
    /// ```
    /// use kws_runner::pipeline::RunnerState;
    ///
    /// assert_eq!(RunnerState::Running.label(), "Running");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            RunnerState::Idle => "Idle",
            RunnerState::Running => "Running",
            RunnerState::Stopping => "Stopping",
        }
    }
}

impl std::fmt::Display for RunnerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_worker_is_idle() {
        assert_eq!(RunnerState::derive(false, false), RunnerState::Idle);
        // A set flag without a thread is a start in progress, still Idle.
        assert_eq!(RunnerState::derive(false, true), RunnerState::Idle);
    }

    #[test]
    fn worker_with_flag_is_running() {
        assert_eq!(RunnerState::derive(true, true), RunnerState::Running);
    }

    #[test]
    fn worker_without_flag_is_stopping() {
        assert_eq!(RunnerState::derive(true, false), RunnerState::Stopping);
    }

    #[test]
    fn default_is_idle() {
        assert_eq!(RunnerState::default(), RunnerState::Idle);
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(RunnerState::Stopping.to_string(), "Stopping");
        assert_eq!(RunnerState::Idle.label(), "Idle");
    }
}
