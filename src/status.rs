use super::error::{ClientError, Result};

/// Server-reported status of a submitted job.
///
/// The server answers every `jobStatus` query independently, so the same
/// status can legitimately be reported more than once and the sequence is
/// not guaranteed strictly monotonic from the client's point of view.
/// `Complete` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Initializing,
    Pending,
    Producing,
    Complete,
    Error,
}

impl JobStatus {
    /// Decode the wire representation: a UTF-8 string exactly matching one
    /// variant name. Anything else is a fatal decode error, never a default.
    pub fn from_wire(s: &str) -> Result<Self> {
        match s {
            "INITIALIZING" => Ok(JobStatus::Initializing),
            "PENDING" => Ok(JobStatus::Pending),
            "PRODUCING" => Ok(JobStatus::Producing),
            "COMPLETE" => Ok(JobStatus::Complete),
            "ERROR" => Ok(JobStatus::Error),
            other => Err(ClientError::UnknownStatus(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Pending => "PENDING",
            JobStatus::Producing => "PRODUCING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Error => "ERROR",
        }
    }

    /// Whether the job can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        JobStatus::from_wire(s)
    }
}
