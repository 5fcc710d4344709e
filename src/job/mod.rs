//! Document translation job: lifecycle, pre-flight checks, and the poller
//! that drives a server-side job to a saved result.

pub mod machine;
pub mod phase;
pub mod poller;
pub mod sink;
pub mod upload;

pub use machine::{JobSnapshot, JobStateMachine};
pub use phase::{JobEvent, JobPhase, ServerPhase};
pub use poller::{JobOutcome, JobPoller, PollSettings};
pub use sink::{DirectorySink, ResultSink};
pub use upload::JobRequest;

/// Status line for the presenter. Nothing is shown while idle or completed;
/// errors show their detail.
pub fn status_line(snapshot: &JobSnapshot) -> Option<String> {
    match snapshot.phase {
        JobPhase::Idle | JobPhase::Completed => None,
        JobPhase::Error => Some(
            snapshot
                .error_detail
                .clone()
                .unwrap_or_else(|| "translation failed".to_string()),
        ),
        JobPhase::Uploading => Some("Uploading document...".to_string()),
        JobPhase::Processing => Some("Processing document...".to_string()),
        JobPhase::Extracting => Some("Extracting terms...".to_string()),
        JobPhase::CreatingGlossary => Some("Creating glossary...".to_string()),
        JobPhase::Translating => Some(match snapshot.seconds_remaining {
            Some(secs) => format!("Translating... about {secs}s remaining"),
            None => "Translating...".to_string(),
        }),
        JobPhase::Downloading => Some("Downloading result...".to_string()),
    }
}
