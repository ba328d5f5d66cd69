//! View-mode and immersion transitions.
//!
//! Every transition either succeeds and returns the new state, or fails and
//! leaves the state untouched. States are `ViewMode x is_immersive`; while
//! immersive only `presentation` can be selected.

use foundation::error::{DomeError, DomeResult};

use crate::state::{NavigationState, ViewMode};

#[derive(Debug, Clone, Default)]
pub struct NavigationMachine {
    state: NavigationState,
}

impl NavigationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Valid from any state; immersion is left as is.
    pub fn navigate_to_project(&mut self, project_id: &str) -> DomeResult<NavigationState> {
        if project_id.is_empty() {
            return Err(DomeError::InvalidCoordinates(
                "project id must not be empty".to_string(),
            ));
        }
        self.state.current_project = Some(project_id.to_string());
        self.state.view_mode = ViewMode::Project;
        tracing::info!(project = project_id, "navigated to project");
        Ok(self.state.clone())
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> DomeResult<NavigationState> {
        if self.state.is_immersive && mode != ViewMode::Presentation {
            return Err(DomeError::Interaction(format!(
                "cannot switch to {mode} view while immersive"
            )));
        }
        if self.state.view_mode != mode {
            tracing::info!(from = %self.state.view_mode, to = %mode, "view mode changed");
        }
        self.state.view_mode = mode;
        Ok(self.state.clone())
    }

    /// An empty `project_id` re-enters the current project.
    pub fn enter_immersive_mode(&mut self, project_id: &str) -> DomeResult<NavigationState> {
        let project = if project_id.is_empty() {
            self.state
                .current_project
                .clone()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    DomeError::Interaction(
                        "no project selected for immersive mode".to_string(),
                    )
                })?
        } else {
            project_id.to_string()
        };
        tracing::info!(project = %project, "entering immersive mode");
        self.state.current_project = Some(project);
        self.state.is_immersive = true;
        self.state.view_mode = ViewMode::Presentation;
        Ok(self.state.clone())
    }

    pub fn exit_immersive_mode(&mut self) -> DomeResult<NavigationState> {
        if !self.state.is_immersive {
            return Err(DomeError::Interaction(
                "not in immersive mode".to_string(),
            ));
        }
        self.state.is_immersive = false;
        self.state.view_mode = ViewMode::Project;
        tracing::info!("left immersive mode");
        Ok(self.state.clone())
    }

    pub fn select_region(&mut self, region: Option<String>) -> DomeResult<NavigationState> {
        if region.as_deref() == Some("") {
            return Err(DomeError::InvalidCoordinates(
                "region id must not be empty".to_string(),
            ));
        }
        self.state.selected_region = region;
        Ok(self.state.clone())
    }

    pub fn set_zoom_level(&mut self, zoom: f64) -> DomeResult<NavigationState> {
        if !(zoom.is_finite() && zoom >= 0.0) {
            return Err(DomeError::InvalidCoordinates(format!(
                "zoom level must be finite and non-negative, got {zoom}"
            )));
        }
        self.state.zoom_level = zoom;
        Ok(self.state.clone())
    }
}
