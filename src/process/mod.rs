//! External process supervision.
//!
//! Three pieces: a [`CommandRunner`] for one-shot commands with a deadline,
//! a [`StartupProbe`] that judges whether a long-running server came up, and
//! a [`ProcessTracker`] holding every child a deployment still owns.

mod error;
mod prober;
mod runner;
mod scripted;
mod tracker;

pub use error::{ProcessError, ProcessResult};
pub use prober::{
    DEFAULT_READINESS_MARKER, ProcessStartupProber, StartupProbe, StartupReport, StartupSignal,
    evaluate,
};
pub use runner::{CommandInvocation, CommandOutput, CommandRunner, TIMED_OUT_MESSAGE, TokioCommandRunner};
pub use scripted::{ScriptedCommandRunner, ScriptedStartupProbe};
pub use tracker::{KillReport, ProcessTracker, TrackedProcess};
