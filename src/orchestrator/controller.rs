//! Per-program command controller.
//!
//! Each user action is admitted by the guard, builds its payload from the live form,
//! sends one request, and reconciles the program's view with the outcome.

use super::guard::ProgramOperationGuard;
use crate::gateway::RequestGateway;
use crate::model::ProgramId;
use crate::panel::form::FormError;
use crate::panel::view::ProgramView;
use crate::panel::{self, reconcile, SharedPanel};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Commands emitted by the TUI.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    StartStop(ProgramId),
    UpdateConfig(ProgramId),
    ConfigChanged { program: ProgramId, field: String },
    Quit,
}

/// What happened to a requested operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The request was sent; carries the program's view after reconciliation.
    Completed(ProgramView),
    /// Another operation on the same program was in flight.
    Dropped,
    /// A live edit arrived while the program's auto-update toggle was off.
    AutoUpdateOff,
}

#[derive(Debug, Clone, Copy)]
enum Control {
    StateSwitch,
    Update,
}

/// Keeps a program control disabled until dropped.
struct DisabledControl<'a> {
    panel: &'a SharedPanel,
    program: &'a ProgramId,
    control: Control,
}

impl<'a> DisabledControl<'a> {
    fn new(panel: &'a SharedPanel, program: &'a ProgramId, control: Control) -> Self {
        set_enabled(panel::lock(panel).view_mut(program), control, false);
        Self {
            panel,
            program,
            control,
        }
    }
}

impl Drop for DisabledControl<'_> {
    fn drop(&mut self) {
        set_enabled(
            panel::lock(self.panel).view_mut(self.program),
            self.control,
            true,
        );
    }
}

fn set_enabled(view: &mut ProgramView, control: Control, enabled: bool) {
    match control {
        Control::StateSwitch => view.switch_enabled = enabled,
        Control::Update => view.update_enabled = enabled,
    }
}

pub struct ProgramController {
    gateway: Arc<dyn RequestGateway>,
    panel: SharedPanel,
    guard: ProgramOperationGuard,
}

impl ProgramController {
    pub fn new(gateway: Arc<dyn RequestGateway>, panel: SharedPanel) -> Self {
        Self {
            gateway,
            panel,
            guard: ProgramOperationGuard::default(),
        }
    }

    pub fn guard(&self) -> &ProgramOperationGuard {
        &self.guard
    }

    fn view_snapshot(&self, program: &ProgramId) -> ProgramView {
        panel::lock(&self.panel).view_mut(program).clone()
    }

    /// Toggle a program between running and stopped.
    pub async fn start_stop(&self, program: &ProgramId) -> Dispatch {
        let Some(_permit) = self.guard.try_admit(program) else {
            debug!(%program, "start/stop dropped, operation in flight");
            return Dispatch::Dropped;
        };
        let switch = DisabledControl::new(&self.panel, program, Control::StateSwitch);

        let config = {
            let mut panel = panel::lock(&self.panel);
            panel.view_mut(program).additional_controls_visible = false;
            panel.forms.extract_config(program)
        };

        let outcome = self.gateway.execute(program, &config).await;
        reconcile::apply_start_stop(panel::lock(&self.panel).view_mut(program), &outcome);
        info!(%program, success = outcome.is_success(), "start/stop completed");

        drop(switch);
        Dispatch::Completed(self.view_snapshot(program))
    }

    /// Push the whole form of a program.
    pub async fn update_config(&self, program: &ProgramId) -> Dispatch {
        let Some(_permit) = self.guard.try_admit(program) else {
            debug!(%program, "config update dropped, operation in flight");
            return Dispatch::Dropped;
        };
        let update = DisabledControl::new(&self.panel, program, Control::Update);

        let config = panel::lock(&self.panel).forms.extract_config(program);
        let outcome = self.gateway.update_config(program, &config).await;
        reconcile::apply_config_update(panel::lock(&self.panel).view_mut(program), &outcome);
        info!(%program, success = outcome.is_success(), "config update completed");

        drop(update);
        Dispatch::Completed(self.view_snapshot(program))
    }

    /// Push one edited field, if the program has auto-update switched on.
    ///
    /// Fails without sending anything when the field or the program's auto-update
    /// toggle does not exist.
    pub async fn config_changed(
        &self,
        program: &ProgramId,
        field: &str,
    ) -> Result<Dispatch, FormError> {
        {
            let panel = panel::lock(&self.panel);
            if !panel.forms.auto_update(program)? {
                return Ok(Dispatch::AutoUpdateOff);
            }
            // Checked before admission so a bad field never occupies the guard.
            panel.forms.extract_config_value(program, field)?;
        }

        let Some(_permit) = self.guard.try_admit(program) else {
            debug!(%program, field, "live edit dropped, operation in flight");
            return Ok(Dispatch::Dropped);
        };
        let update = DisabledControl::new(&self.panel, program, Control::Update);

        let value = panel::lock(&self.panel)
            .forms
            .extract_config_value(program, field)?;
        let outcome = self
            .gateway
            .update_config_value(program, field, &value)
            .await;
        reconcile::apply_config_update(panel::lock(&self.panel).view_mut(program), &outcome);
        info!(%program, field, %value, success = outcome.is_success(), "live edit completed");

        drop(update);
        Ok(Dispatch::Completed(self.view_snapshot(program)))
    }
}

/// Dispatch TUI commands, one task per command, until the TUI quits.
pub(crate) async fn run_controller(
    controller: Arc<ProgramController>,
    panel: SharedPanel,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let ctrl = controller.clone();
                match cmd {
                    Some(UiCommand::StartStop(program)) => {
                        tasks.spawn(async move {
                            ctrl.start_stop(&program).await;
                        });
                    }
                    Some(UiCommand::UpdateConfig(program)) => {
                        tasks.spawn(async move {
                            ctrl.update_config(&program).await;
                        });
                    }
                    Some(UiCommand::ConfigChanged { program, field }) => {
                        let panel = panel.clone();
                        tasks.spawn(async move {
                            if let Err(e) = ctrl.config_changed(&program, &field).await {
                                warn!(%program, error = %e, "live edit refused");
                                panel::lock(&panel).notice = format!("Live edit refused: {e}");
                            }
                        });
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            Some(joined) = tasks.join_next() => {
                if let Err(e) = joined {
                    error!(error = %e, "controller task failed");
                }
            }
        }
    }

    // In-flight requests are not cancelled; they finish or die with the runtime.
    tasks.detach_all();
}
