//! Form registry and configuration extraction.
//!
//! Fields are registered per program and looked up by `(program, field)`, never by
//! scanning element ids for a prefix. The `<program>-<field>` element id is kept only
//! as the name users see and the name reported in errors.

use crate::model::{ConfigMapping, ConfigValue, ProgramId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::view::{field_element_id, Element};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[serde(alias = "string", alias = "str")]
    Text,
    #[serde(alias = "int", alias = "integer", alias = "float")]
    Number,
    #[serde(alias = "bool", alias = "boolean")]
    Checkbox,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("no element with id {element_id:?}")]
    FieldNotFound { element_id: String },
    #[error("invalid value {value:?} for {element_id:?}")]
    InvalidValue { element_id: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub display_name: String,
    pub kind: FieldKind,
    pub value: ConfigValue,
}

impl FormField {
    /// Parse user input according to the field kind.
    fn parse_input(&self, program: &ProgramId, raw: &str) -> Result<ConfigValue, FormError> {
        let invalid = || FormError::InvalidValue {
            element_id: field_element_id(program, &self.name),
            value: raw.to_string(),
        };
        match self.kind {
            FieldKind::Checkbox => match raw.trim() {
                "true" | "on" | "1" => Ok(ConfigValue::Flag(true)),
                "false" | "off" | "0" => Ok(ConfigValue::Flag(false)),
                _ => Err(invalid()),
            },
            FieldKind::Number => {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
                    Ok(ConfigValue::Text(trimmed.to_string()))
                } else {
                    Err(invalid())
                }
            }
            FieldKind::Text => Ok(ConfigValue::Text(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ProgramForm {
    fields: Vec<FormField>,
    auto_update: Option<bool>,
}

/// All form fields on the panel, grouped by program.
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    programs: BTreeMap<ProgramId, ProgramForm>,
}

impl FormRegistry {
    /// Register a program; `auto_update` is `None` when the program has no auto-update toggle.
    pub fn register_program(&mut self, program: ProgramId, auto_update: Option<bool>) {
        self.programs.entry(program).or_default().auto_update = auto_update;
    }

    /// Add a field, replacing any field of the same name.
    pub fn register_field(&mut self, program: &ProgramId, field: FormField) {
        let form = self.programs.entry(program.clone()).or_default();
        match form.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => form.fields.push(field),
        }
    }

    pub fn fields(&self, program: &ProgramId) -> &[FormField] {
        self.programs
            .get(program)
            .map(|f| f.fields.as_slice())
            .unwrap_or(&[])
    }

    /// Current configuration of a program. Unknown programs yield an empty mapping.
    pub fn extract_config(&self, program: &ProgramId) -> ConfigMapping {
        self.fields(program)
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }

    /// Current value of one field.
    pub fn extract_config_value(
        &self,
        program: &ProgramId,
        field: &str,
    ) -> Result<ConfigValue, FormError> {
        self.field(program, field).map(|f| f.value.clone())
    }

    /// State of the program's auto-update toggle.
    pub fn auto_update(&self, program: &ProgramId) -> Result<bool, FormError> {
        self.programs
            .get(program)
            .and_then(|f| f.auto_update)
            .ok_or_else(|| FormError::FieldNotFound {
                element_id: Element::ConfigAutoUpdate.id(program),
            })
    }

    pub fn set_auto_update(&mut self, program: &ProgramId, on: bool) -> Result<(), FormError> {
        match self.programs.get_mut(program) {
            Some(form) if form.auto_update.is_some() => {
                form.auto_update = Some(on);
                Ok(())
            }
            _ => Err(FormError::FieldNotFound {
                element_id: Element::ConfigAutoUpdate.id(program),
            }),
        }
    }

    /// Store raw user input in a field, validated against the field kind.
    pub fn set_input(
        &mut self,
        program: &ProgramId,
        field: &str,
        raw: &str,
    ) -> Result<ConfigValue, FormError> {
        let target = self.field_mut(program, field)?;
        let value = target.parse_input(program, raw)?;
        target.value = value.clone();
        Ok(value)
    }

    /// Flip a checkbox field and return its new state.
    pub fn toggle_flag(&mut self, program: &ProgramId, field: &str) -> Result<bool, FormError> {
        let target = self.field_mut(program, field)?;
        if let ConfigValue::Flag(b) = target.value {
            target.value = ConfigValue::Flag(!b);
            return Ok(!b);
        }
        Err(FormError::InvalidValue {
            element_id: field_element_id(program, field),
            value: target.value.to_form_value(),
        })
    }

    fn field(&self, program: &ProgramId, field: &str) -> Result<&FormField, FormError> {
        self.fields(program)
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| FormError::FieldNotFound {
                element_id: field_element_id(program, field),
            })
    }

    fn field_mut(&mut self, program: &ProgramId, field: &str) -> Result<&mut FormField, FormError> {
        self.programs
            .get_mut(program)
            .and_then(|form| form.fields.iter_mut().find(|f| f.name == field))
            .ok_or_else(|| FormError::FieldNotFound {
                element_id: field_element_id(program, field),
            })
    }
}
