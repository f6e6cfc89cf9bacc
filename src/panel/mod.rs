//! In-process model of the panel page.
//!
//! The panel holds the form registry and one view per program. The log region is kept
//! apart so the poller never contends with program operations.

pub(crate) mod form;
pub(crate) mod reconcile;
pub(crate) mod view;

use crate::layout::{LayoutError, PanelLayout};
use crate::model::ProgramId;
use form::{FormField, FormRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use view::ProgramView;

#[derive(Debug, Clone, Default)]
pub struct Panel {
    order: Vec<ProgramId>,
    pub forms: FormRegistry,
    views: HashMap<ProgramId, ProgramView>,
    /// Last message for the status line.
    pub notice: String,
}

impl Panel {
    pub fn from_layout(layout: &PanelLayout) -> Result<Self, LayoutError> {
        let mut panel = Panel::default();
        for program in &layout.programs {
            let id = program.name.clone();
            panel.forms.register_program(id.clone(), program.auto_update);
            for field in &program.fields {
                panel.forms.register_field(
                    &id,
                    FormField {
                        name: field.name.clone(),
                        display_name: field
                            .display_name
                            .clone()
                            .unwrap_or_else(|| field.name.clone()),
                        kind: field.kind,
                        value: field.initial_value(&id)?,
                    },
                );
            }
            panel.views.insert(id.clone(), ProgramView::default());
            panel.order.push(id);
        }
        Ok(panel)
    }

    /// Programs in layout order.
    pub fn programs(&self) -> &[ProgramId] {
        &self.order
    }

    pub fn view(&self, program: &ProgramId) -> Option<&ProgramView> {
        self.views.get(program)
    }

    /// View of a program, created with initial labels if the program was not laid out.
    pub fn view_mut(&mut self, program: &ProgramId) -> &mut ProgramView {
        self.views.entry(program.clone()).or_default()
    }
}

pub type SharedPanel = Arc<Mutex<Panel>>;

pub fn shared(panel: Panel) -> SharedPanel {
    Arc::new(Mutex::new(panel))
}

/// Lock the panel. A panic in another holder does not leave the panel unusable.
pub fn lock(panel: &SharedPanel) -> MutexGuard<'_, Panel> {
    panel.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Default)]
pub struct LogContent {
    pub text: String,
    pub refreshed_at: Option<time::OffsetDateTime>,
}

/// The single shared log display region. Every write replaces the whole content.
#[derive(Debug, Clone, Default)]
pub struct LogRegion {
    inner: Arc<RwLock<LogContent>>,
}

impl LogRegion {
    pub fn replace(&self, text: String) {
        let mut content = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        content.text = text;
        content.refreshed_at = Some(
            time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc()),
        );
    }

    pub fn snapshot(&self) -> LogContent {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
