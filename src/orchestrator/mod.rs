//! Application-level orchestration.
//!
//! This module owns the per-program operation lifecycle (admission, request,
//! reconciliation, release) and the background log poller. UI/CLI layers call into
//! this module to keep responsibilities separated.

mod controller;
mod guard;
mod log_poller;

pub(crate) use controller::{run_controller, Dispatch, ProgramController, UiCommand};
pub(crate) use guard::ProgramOperationGuard;
pub(crate) use log_poller::LogPoller;
