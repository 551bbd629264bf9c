//! Target lifecycle events seen by the loader.
//!
//! The debugger core reports process and stop notifications as
//! [`TargetEvent`]s; [`crate::solib::DeviceLoader::dispatch`] routes each one
//! to the matching loader hook.

use crate::types::ProcessId;

/// Lifecycle notification for the debugged target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent
{
    /// A process was started or attached to and is ready to inspect.
    ProcessCreated(ProcessId),
    /// The process is about to start; stale loader state should go.
    InferiorCreated
    {
        /// Whether the start was requested interactively.
        from_tty: bool,
    },
    /// The target stopped and its module lists may have changed.
    Stopped,
    /// The process exited.
    Exited(ProcessId),
    /// The debugger detached from the process.
    Detached(ProcessId),
}

impl TargetEvent
{
    /// Human-readable description of the event.
    #[must_use]
    pub fn describe(&self) -> String
    {
        match self {
            Self::ProcessCreated(pid) => format!("process {pid} created"),
            Self::InferiorCreated { from_tty: true } => "inferior starting (interactive)".to_string(),
            Self::InferiorCreated { from_tty: false } => "inferior starting".to_string(),
            Self::Stopped => "target stopped".to_string(),
            Self::Exited(pid) => format!("process {pid} exited"),
            Self::Detached(pid) => format!("detached from process {pid}"),
        }
    }

    /// Process the event is about, when it names one.
    #[must_use]
    pub fn process(&self) -> Option<ProcessId>
    {
        match *self {
            Self::ProcessCreated(pid) | Self::Exited(pid) | Self::Detached(pid) => Some(pid),
            Self::InferiorCreated { .. } | Self::Stopped => None,
        }
    }
}
