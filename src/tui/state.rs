#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Programs,
    Fields,
}

/// In-progress text edit of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    pub field: String,
    pub text: String,
}

/// Navigation state, owned by the UI thread only.
#[derive(Debug, Default)]
pub struct UiState {
    pub program_selected: usize,
    pub field_selected: usize,
    pub focus: Focus,
    pub editing: Option<EditBuffer>,
    pub show_help: bool,
    pub info: String,
}

impl UiState {
    pub fn select_next_program(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.program_selected = (self.program_selected + 1) % count;
        self.field_selected = 0;
    }

    pub fn select_prev_program(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.program_selected = (self.program_selected + count - 1) % count;
        self.field_selected = 0;
    }

    pub fn select_next_field(&mut self, count: usize) {
        if count > 0 {
            self.field_selected = (self.field_selected + 1) % count;
        }
    }

    pub fn select_prev_field(&mut self, count: usize) {
        if count > 0 {
            self.field_selected = (self.field_selected + count - 1) % count;
        }
    }

    /// Tab cycles Programs -> Fields -> Programs; programs without fields keep focus.
    pub fn cycle_focus(&mut self, field_count: usize) {
        self.focus = match self.focus {
            Focus::Programs if field_count > 0 => Focus::Fields,
            _ => Focus::Programs,
        };
        if self.field_selected >= field_count {
            self.field_selected = 0;
        }
    }

    /// Keep selections in range after the panel changed underneath.
    pub fn clamp(&mut self, program_count: usize, field_count: usize) {
        self.program_selected = self.program_selected.min(program_count.saturating_sub(1));
        self.field_selected = self.field_selected.min(field_count.saturating_sub(1));
        if field_count == 0 {
            self.focus = Focus::Programs;
        }
    }

    pub fn begin_edit(&mut self, field: &str, current: &str) {
        self.editing = Some(EditBuffer {
            field: field.to_string(),
            text: current.to_string(),
        });
    }
}
