use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Overview map of all projects.
    #[default]
    Map,
    Project,
    Tour,
    Presentation,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Map => "map",
            ViewMode::Project => "project",
            ViewMode::Tour => "tour",
            ViewMode::Presentation => "presentation",
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the viewer is looking at. Only [`crate::NavigationMachine`]
/// transitions change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NavigationState {
    pub current_project: Option<String>,
    pub view_mode: ViewMode,
    pub is_immersive: bool,
    pub selected_region: Option<String>,
    pub zoom_level: f64,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_project: None,
            view_mode: ViewMode::Map,
            is_immersive: false,
            selected_region: None,
            zoom_level: 1.0,
        }
    }
}
