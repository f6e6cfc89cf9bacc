//! Panel layout file: which programs exist and which configuration fields they expose.

use crate::model::{ConfigValue, ProgramId};
use crate::panel::form::FieldKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to read layout {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse layout {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("program {0:?} is declared more than once")]
    DuplicateProgram(String),
    #[error("program {program:?} declares field {field:?} more than once")]
    DuplicateField { program: String, field: String },
    #[error("field {field:?} of program {program:?}: {reason}")]
    InvalidDefault {
        program: String,
        field: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelLayout {
    #[serde(default)]
    pub programs: Vec<ProgramLayout>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramLayout {
    pub name: ProgramId,
    /// `None` means the program has no auto-update toggle; live edits are then refused.
    #[serde(default)]
    pub auto_update: Option<bool>,
    #[serde(default)]
    pub fields: Vec<FieldLayout>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl FieldLayout {
    /// Initial form value derived from the declared default.
    pub fn initial_value(&self, program: &ProgramId) -> Result<ConfigValue, LayoutError> {
        let invalid = |reason| LayoutError::InvalidDefault {
            program: program.to_string(),
            field: self.name.clone(),
            reason,
        };
        match (self.kind, &self.default) {
            (FieldKind::Checkbox, None) => Ok(ConfigValue::Flag(false)),
            (FieldKind::Checkbox, Some(serde_json::Value::Bool(b))) => Ok(ConfigValue::Flag(*b)),
            (FieldKind::Checkbox, Some(_)) => Err(invalid("checkbox default must be a boolean")),
            (_, None) => Ok(ConfigValue::Text(String::new())),
            (_, Some(serde_json::Value::String(s))) => Ok(ConfigValue::Text(s.clone())),
            (_, Some(serde_json::Value::Number(n))) => Ok(ConfigValue::Text(n.to_string())),
            (_, Some(_)) => Err(invalid("default must be a string or a number")),
        }
    }
}

impl PanelLayout {
    pub fn from_json(path: &Path, raw: &str) -> Result<Self, LayoutError> {
        let layout: PanelLayout =
            serde_json::from_str(raw).map_err(|source| LayoutError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LayoutError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &raw)
    }

    fn validate(&self) -> Result<(), LayoutError> {
        let mut programs = HashSet::new();
        for program in &self.programs {
            if !programs.insert(program.name.as_str()) {
                return Err(LayoutError::DuplicateProgram(program.name.to_string()));
            }
            let mut fields = HashSet::new();
            for field in &program.fields {
                if !fields.insert(field.name.as_str()) {
                    return Err(LayoutError::DuplicateField {
                        program: program.name.to_string(),
                        field: field.name.clone(),
                    });
                }
                field.initial_value(&program.name)?;
            }
        }
        Ok(())
    }
}

/// Default layout location: `<config dir>/program-panel/panel.json`.
pub fn default_layout_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("program-panel")
        .join("panel.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<PanelLayout, LayoutError> {
        PanelLayout::from_json(Path::new("panel.json"), raw)
    }

    #[test]
    fn parses_field_kinds_and_aliases() {
        let layout = parse(
            r#"{"programs":[{"name":"line_follow","auto_update":false,"fields":[
                {"name":"speed","kind":"int","default":30},
                {"name":"label","kind":"string","default":"left"},
                {"name":"debug","kind":"boolean","default":true}
            ]}]}"#,
        )
        .unwrap();
        let program = &layout.programs[0];
        assert_eq!(program.auto_update, Some(false));
        assert_eq!(program.fields[0].kind, FieldKind::Number);
        assert_eq!(
            program.fields[0].initial_value(&program.name).unwrap(),
            ConfigValue::Text("30".into())
        );
        assert_eq!(program.fields[1].kind, FieldKind::Text);
        assert_eq!(
            program.fields[2].initial_value(&program.name).unwrap(),
            ConfigValue::Flag(true)
        );
    }

    #[test]
    fn rejects_duplicates() {
        let err = parse(r#"{"programs":[{"name":"a"},{"name":"a"}]}"#).unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateProgram(ref p) if p == "a"));

        let err = parse(
            r#"{"programs":[{"name":"a","fields":[
                {"name":"x","kind":"text"},{"name":"x","kind":"number"}
            ]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::DuplicateField { .. }));
    }

    #[test]
    fn accepts_programs_sharing_a_prefix() {
        let layout = parse(r#"{"programs":[{"name":"a"},{"name":"a-b"}]}"#).unwrap();
        assert_eq!(layout.programs[1].name.as_str(), "a-b");
    }

    #[test]
    fn rejects_non_boolean_checkbox_default() {
        let err = parse(
            r#"{"programs":[{"name":"a","fields":[{"name":"x","kind":"checkbox","default":"yes"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidDefault { .. }));
    }

    #[test]
    fn empty_layout_is_valid() {
        assert!(parse("{}").unwrap().programs.is_empty());
    }
}
