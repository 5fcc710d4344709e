//! Thread-safe job state holder with a watch channel for presenters.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::phase::{transition, JobEvent, JobPhase, ServerPhase};
use crate::error::JobError;

/// What a presenter renders for the document job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub error_detail: Option<String>,
    pub document_id: Option<String>,
    pub has_glossary: bool,
    /// Status polls issued so far for the current job.
    pub attempts: u32,
    pub seconds_remaining: Option<u64>,
}

impl JobSnapshot {
    fn idle() -> Self {
        Self {
            phase: JobPhase::Idle,
            error_detail: None,
            document_id: None,
            has_glossary: false,
            attempts: 0,
            seconds_remaining: None,
        }
    }
}

pub struct JobStateMachine {
    snapshot: RwLock<JobSnapshot>,
    /// Incremented per started job; guards the delayed reset.
    serial: AtomicU64,
    tx: watch::Sender<JobSnapshot>,
    rx: watch::Receiver<JobSnapshot>,
}

impl Default for JobStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStateMachine {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(JobSnapshot::idle());
        Self {
            snapshot: RwLock::new(JobSnapshot::idle()),
            serial: AtomicU64::new(0),
            tx,
            rx,
        }
    }

    pub fn current(&self) -> JobPhase {
        self.snapshot.read().phase
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.snapshot.read().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.rx.clone()
    }

    pub fn serial(&self) -> u64 {
        self.serial.load(Ordering::SeqCst)
    }

    /// Start a new job if the trigger is enabled. `preflight` runs under the
    /// state lock; its failure moves the machine to `Error` with no upload.
    pub fn begin<F>(&self, preflight: F) -> Result<u64, JobError>
    where
        F: FnOnce() -> Result<(), JobError>,
    {
        let mut snap = self.snapshot.write();
        if !snap.phase.accepts_new_job() {
            warn!(phase = %snap.phase, "job start refused while another job runs");
            return Err(JobError::Busy);
        }
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let prev = snap.phase;
        *snap = JobSnapshot::idle();

        let outcome = preflight();
        let event = match &outcome {
            Ok(()) => JobEvent::Start,
            Err(e) => JobEvent::Rejected {
                message: e.to_string(),
            },
        };
        // accepts_new_job() guarantees both events are valid here.
        let next = transition(prev, &event).unwrap_or(JobPhase::Error);
        Self::absorb(&mut snap, next, &event);
        let _ = self.tx.send(snap.clone());
        info!(from = %prev, to = %next, serial, "job_transition");

        outcome.map(|()| serial)
    }

    /// Feed an event through the transition function. Returns the new phase,
    /// or `None` (state untouched) if the event is invalid in the current phase.
    pub fn apply(&self, event: JobEvent) -> Option<JobPhase> {
        let mut snap = self.snapshot.write();
        let current = snap.phase;
        let Some(next) = transition(current, &event) else {
            warn!(phase = %current, event = ?event, "invalid job transition");
            return None;
        };
        Self::absorb(&mut snap, next, &event);
        let _ = self.tx.send(snap.clone());
        if next != current {
            info!(from = %current, to = %next, "job_transition");
        }
        Some(next)
    }

    /// Mutate non-phase snapshot fields and notify subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let mut snap = self.snapshot.write();
        let phase = snap.phase;
        f(&mut *snap);
        snap.phase = phase;
        let _ = self.tx.send(snap.clone());
    }

    /// Reset `Completed` to `Idle` unless a newer job has started since `serial`.
    pub fn reset_if_current(&self, serial: u64) -> bool {
        if self.serial() != serial {
            return false;
        }
        let mut snap = self.snapshot.write();
        if snap.phase != JobPhase::Completed || self.serial() != serial {
            return false;
        }
        *snap = JobSnapshot::idle();
        let _ = self.tx.send(snap.clone());
        info!(from = %JobPhase::Completed, to = %JobPhase::Idle, serial, "job_transition");
        true
    }

    /// Move a job whose driver went away to `Error` so the trigger is enabled
    /// again. No-op once a newer job started or the job already settled.
    pub fn abandon_if_current(&self, serial: u64, message: &str) -> bool {
        let mut snap = self.snapshot.write();
        if self.serial() != serial || snap.phase.accepts_new_job() {
            return false;
        }
        let event = JobEvent::Failed {
            message: message.to_string(),
        };
        let prev = snap.phase;
        Self::absorb(&mut snap, JobPhase::Error, &event);
        let _ = self.tx.send(snap.clone());
        info!(from = %prev, to = %JobPhase::Error, serial, "job_transition");
        true
    }

    fn absorb(snap: &mut JobSnapshot, next: JobPhase, event: &JobEvent) {
        snap.phase = next;
        match event {
            JobEvent::Rejected { message } | JobEvent::Failed { message } => {
                snap.error_detail = Some(message.clone());
            }
            JobEvent::Status(ServerPhase::Error { message }) => {
                snap.error_detail =
                    Some(message.clone().unwrap_or_else(|| "translation failed".to_string()));
            }
            JobEvent::Reset => *snap = JobSnapshot::idle(),
            _ => {}
        }
    }
}
