use crate::model::ProgramId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-program elements addressed by `program-<name>-<suffix>` ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    State,
    StateSwitch,
    SuccessText,
    FailText,
    AdditionalControls,
    Update,
    ConfigAutoUpdate,
}

impl Element {
    fn suffix(self) -> &'static str {
        match self {
            Element::State => "state",
            Element::StateSwitch => "state-switch",
            Element::SuccessText => "success-text",
            Element::FailText => "fail-text",
            Element::AdditionalControls => "additional-controls",
            Element::Update => "update",
            Element::ConfigAutoUpdate => "config-auto-update",
        }
    }

    pub fn id(self, program: &ProgramId) -> String {
        format!("program-{}-{}", program, self.suffix())
    }
}

/// Element id of a configuration field.
pub fn field_element_id(program: &ProgramId, field: &str) -> String {
    format!("{program}-{field}")
}

/// Visible state of one program on the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramView {
    pub switch_label: String,
    pub state_label: String,
    pub switch_enabled: bool,
    pub update_enabled: bool,
    pub additional_controls: String,
    pub additional_controls_visible: bool,
    pub success_visible: bool,
    pub fail_visible: bool,
}

impl Default for ProgramView {
    fn default() -> Self {
        Self {
            switch_label: "Start".into(),
            state_label: "not running".into(),
            switch_enabled: true,
            update_enabled: true,
            additional_controls: String::new(),
            additional_controls_visible: false,
            success_visible: false,
            fail_visible: false,
        }
    }
}

impl ProgramView {
    /// Visible elements keyed by element id. Hidden elements are left out.
    pub fn visible_elements(&self, program: &ProgramId) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert(Element::State.id(program), self.state_label.clone());
        out.insert(Element::StateSwitch.id(program), self.switch_label.clone());
        out.insert(Element::Update.id(program), "Update".to_string());
        if self.success_visible {
            out.insert(Element::SuccessText.id(program), "Success".to_string());
        }
        if self.fail_visible {
            out.insert(Element::FailText.id(program), "Failed".to_string());
        }
        if self.additional_controls_visible {
            out.insert(
                Element::AdditionalControls.id(program),
                self.additional_controls.clone(),
            );
        }
        out
    }
}
