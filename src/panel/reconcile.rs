//! Applies gateway outcomes to a program's view.

use crate::model::{OperationOutcome, ShowStatus, StateReport, UpdateReport};

use super::view::ProgramView;

fn show_status(view: &mut ProgramView, status: ShowStatus) {
    view.success_visible = status == ShowStatus::Success;
    view.fail_visible = status == ShowStatus::Fail;
}

/// Reconcile after a start/stop request. A failure keeps the old labels.
pub fn apply_start_stop(view: &mut ProgramView, outcome: &OperationOutcome<StateReport>) {
    match outcome {
        OperationOutcome::Success(report) => {
            view.switch_label = report.state_switch_label.clone();
            view.state_label = report.state_label.clone();
            view.additional_controls = report.additional_controls.clone();
            view.additional_controls_visible = !report.additional_controls.is_empty();
            show_status(view, report.status);
        }
        OperationOutcome::Failure => show_status(view, ShowStatus::Fail),
    }
}

/// Reconcile after a config update. Only the indicators change.
pub fn apply_config_update(view: &mut ProgramView, outcome: &OperationOutcome<UpdateReport>) {
    let status = match outcome {
        OperationOutcome::Success(UpdateReport { success: true }) => ShowStatus::Success,
        _ => ShowStatus::Fail,
    };
    show_status(view, status);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(controls: &str, status: ShowStatus) -> StateReport {
        StateReport {
            state_switch_label: "Stop".into(),
            state_label: "Running".into(),
            additional_controls: controls.into(),
            status,
        }
    }

    #[test]
    fn success_without_controls_keeps_region_hidden() {
        let mut view = ProgramView {
            fail_visible: true,
            ..Default::default()
        };
        apply_start_stop(
            &mut view,
            &OperationOutcome::Success(report("", ShowStatus::Success)),
        );
        assert_eq!(view.switch_label, "Stop");
        assert_eq!(view.state_label, "Running");
        assert!(!view.additional_controls_visible);
        assert!(view.success_visible);
        assert!(!view.fail_visible);
    }

    #[test]
    fn success_with_controls_and_fail_status() {
        let mut view = ProgramView {
            success_visible: true,
            ..Default::default()
        };
        apply_start_stop(
            &mut view,
            &OperationOutcome::Success(report("<div>x</div>", ShowStatus::Fail)),
        );
        assert!(view.additional_controls_visible);
        assert_eq!(view.additional_controls, "<div>x</div>");
        assert!(view.fail_visible);
        assert!(!view.success_visible);
    }

    #[test]
    fn status_none_hides_both_indicators() {
        let mut view = ProgramView {
            success_visible: true,
            fail_visible: true,
            ..Default::default()
        };
        apply_start_stop(
            &mut view,
            &OperationOutcome::Success(report("", ShowStatus::None)),
        );
        assert!(!view.success_visible);
        assert!(!view.fail_visible);
    }

    #[test]
    fn failure_leaves_labels_stale() {
        let mut view = ProgramView {
            success_visible: true,
            ..Default::default()
        };
        apply_start_stop(&mut view, &OperationOutcome::Failure);
        assert_eq!(view.switch_label, "Start");
        assert_eq!(view.state_label, "not running");
        assert!(!view.success_visible);
        assert!(view.fail_visible);
    }

    #[test]
    fn config_update_touches_only_indicators() {
        let mut view = ProgramView {
            additional_controls: "<b>keep</b>".into(),
            additional_controls_visible: true,
            ..Default::default()
        };
        let before = view.clone();

        apply_config_update(
            &mut view,
            &OperationOutcome::Success(UpdateReport { success: true }),
        );
        assert!(view.success_visible && !view.fail_visible);

        apply_config_update(
            &mut view,
            &OperationOutcome::Success(UpdateReport { success: false }),
        );
        assert!(!view.success_visible && view.fail_visible);

        apply_config_update(&mut view, &OperationOutcome::Failure);
        assert!(!view.success_visible && view.fail_visible);

        assert_eq!(view.switch_label, before.switch_label);
        assert_eq!(view.state_label, before.state_label);
        assert_eq!(view.additional_controls, before.additional_controls);
        assert!(view.additional_controls_visible);
    }
}
