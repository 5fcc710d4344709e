//! Job lifecycle: Idle → Uploading → {Processing, Extracting, CreatingGlossary,
//! Translating} → Downloading → Completed → Idle, with Error reachable from
//! every non-terminal phase.
//!
//! `transition` is pure so the lifecycle can be checked without a backend;
//! the poller is the effect executor that feeds it events.

use serde::Serialize;

use crate::backend::StatusReport;

/// UI-facing phase of the document job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobPhase {
    Idle,
    Uploading,
    Processing,
    Extracting,
    CreatingGlossary,
    Translating,
    Downloading,
    Completed,
    Error,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Idle => write!(f, "idle"),
            JobPhase::Uploading => write!(f, "uploading"),
            JobPhase::Processing => write!(f, "processing"),
            JobPhase::Extracting => write!(f, "extracting"),
            JobPhase::CreatingGlossary => write!(f, "creatingGlossary"),
            JobPhase::Translating => write!(f, "translating"),
            JobPhase::Downloading => write!(f, "downloading"),
            JobPhase::Completed => write!(f, "completed"),
            JobPhase::Error => write!(f, "error"),
        }
    }
}

impl JobPhase {
    /// Phases in which a new job may be started (the trigger is enabled).
    pub fn accepts_new_job(self) -> bool {
        matches!(self, JobPhase::Idle | JobPhase::Completed | JobPhase::Error)
    }

    /// Phases driven by server-reported status.
    pub fn is_server_side(self) -> bool {
        matches!(
            self,
            JobPhase::Processing
                | JobPhase::Extracting
                | JobPhase::CreatingGlossary
                | JobPhase::Translating
        )
    }
}

/// Phase string reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPhase {
    ProcessingDocument,
    ExtractingTerms,
    CreatingGlossary,
    Translating,
    Done,
    Error { message: Option<String> },
    /// Anything this client does not know yet.
    Unknown(String),
}

impl ServerPhase {
    pub fn from_report(report: &StatusReport) -> Self {
        match report.status.as_str() {
            "processing_document" => ServerPhase::ProcessingDocument,
            "extracting_terms" => ServerPhase::ExtractingTerms,
            "creating_glossary" => ServerPhase::CreatingGlossary,
            "translating" => ServerPhase::Translating,
            "done" => ServerPhase::Done,
            "error" => ServerPhase::Error {
                message: report.message.clone(),
            },
            other => ServerPhase::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerPhase::Done | ServerPhase::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Pre-flight passed, upload begins.
    Start,
    /// Pre-flight failed; no network call was made.
    Rejected { message: String },
    /// Upload acknowledged with an id/key pair.
    Uploaded,
    Status(ServerPhase),
    /// Result saved.
    Downloaded,
    Failed { message: String },
    /// Display delay after completion elapsed.
    Reset,
}

/// Next phase for `event` in `phase`, or `None` when the event is not valid there.
pub fn transition(phase: JobPhase, event: &JobEvent) -> Option<JobPhase> {
    use JobPhase as P;
    match (phase, event) {
        (p, JobEvent::Start) if p.accepts_new_job() => Some(P::Uploading),
        (p, JobEvent::Rejected { .. }) if p.accepts_new_job() => Some(P::Error),
        (P::Uploading, JobEvent::Uploaded) => Some(P::Translating),
        (p, JobEvent::Status(server)) if p.is_server_side() => Some(match server {
            ServerPhase::ProcessingDocument => P::Processing,
            ServerPhase::ExtractingTerms => P::Extracting,
            ServerPhase::CreatingGlossary => P::CreatingGlossary,
            ServerPhase::Translating => P::Translating,
            ServerPhase::Done => P::Downloading,
            ServerPhase::Error { .. } => P::Error,
            ServerPhase::Unknown(_) => p,
        }),
        (P::Downloading, JobEvent::Downloaded) => Some(P::Completed),
        (p, JobEvent::Failed { .. }) if !matches!(p, P::Idle | P::Completed | P::Error) => {
            Some(P::Error)
        }
        (P::Completed, JobEvent::Reset) => Some(P::Idle),
        _ => None,
    }
}
