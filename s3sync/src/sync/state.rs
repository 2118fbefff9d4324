use s3sync_core::{SyncDetails, SyncMessage};

pub const READY_MESSAGE: &str = "Ready to upload files to S3";
pub const STARTING_MESSAGE: &str = "Starting sync...";
pub const STOPPED_MESSAGE: &str = "Sync stopped";
pub const COMPLETED_MESSAGE: &str = "Sync completed successfully";

/// What is being transferred right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressDetail {
    pub current_file: Option<String>,
    /// Human-readable bytes or count label, e.g. `"26.7% / 1.2 MB"`.
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle {
        message: String,
    },
    Starting {
        message: String,
    },
    Running {
        message: String,
        progress: u8,
        detail: Option<ProgressDetail>,
    },
    Completed {
        message: String,
    },
    Failed {
        message: String,
    },
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Idle {
            message: READY_MESSAGE.to_string(),
        }
    }
}

impl SyncState {
    pub fn message(&self) -> &str {
        match self {
            SyncState::Idle { message }
            | SyncState::Starting { message }
            | SyncState::Running { message, .. }
            | SyncState::Completed { message }
            | SyncState::Failed { message } => message,
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            SyncState::Running { progress, .. } => *progress,
            SyncState::Completed { .. } => 100,
            _ => 0,
        }
    }

    /// A job is in flight; `start` is ignored and `stop` applies.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Starting { .. } | SyncState::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Completed { .. } | SyncState::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Idle { .. } => "idle",
            SyncState::Starting { .. } => "starting",
            SyncState::Running { .. } => "running",
            SyncState::Completed { .. } => "completed",
            SyncState::Failed { .. } => "failed",
        }
    }
}

pub fn clamp_progress(value: Option<f64>) -> Option<u8> {
    let value = value?;
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 100.0) as u8)
}

/// Detail from a progress report. The backend puts `details` either inside
/// the message object or next to it; the message object wins.
pub fn progress_detail(
    message: &SyncMessage,
    details: Option<&SyncDetails>,
) -> Option<ProgressDetail> {
    let details = message.details().or(details)?;
    let label = match (&details.progress, &details.size) {
        (Some(progress), Some(size)) => Some(format!("{progress} / {size}")),
        (Some(progress), None) => Some(progress.clone()),
        (None, Some(size)) => Some(size.clone()),
        (None, None) => match (details.total_files, &details.total_size) {
            (Some(files), Some(size)) => Some(format!("{files} files / {size}")),
            (Some(files), None) => Some(format!("{files} files")),
            (None, Some(size)) => Some(size.clone()),
            (None, None) => None,
        },
    };
    if details.current_file.is_none() && label.is_none() {
        return None;
    }
    Some(ProgressDetail {
        current_file: details.current_file.clone(),
        label,
    })
}
