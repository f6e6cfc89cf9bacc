//! Per-program admission gate.

use crate::model::ProgramId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Tracks which programs have an operation in flight.
///
/// Cloning shares the same running set.
#[derive(Debug, Clone, Default)]
pub struct ProgramOperationGuard {
    running: Arc<Mutex<HashSet<ProgramId>>>,
}

impl ProgramOperationGuard {
    /// Admit an operation on `program`, or `None` if one is already in flight.
    ///
    /// The program stays in flight until the returned permit is dropped.
    pub fn try_admit(&self, program: &ProgramId) -> Option<OperationPermit> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(program.clone()) {
            return None;
        }
        trace!(%program, "admitted");
        Some(OperationPermit {
            guard: self.clone(),
            program: program.clone(),
        })
    }

    pub fn is_in_flight(&self, program: &ProgramId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(program)
    }

    fn release(&self, program: &ProgramId) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(program);
        trace!(%program, "released");
    }
}

/// Proof of admission. Dropping it returns the program to idle on every exit path,
/// including panics and cancelled tasks.
#[derive(Debug)]
pub struct OperationPermit {
    guard: ProgramOperationGuard,
    program: ProgramId,
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        self.guard.release(&self.program);
    }
}
