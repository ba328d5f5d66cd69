use foundation::error::{DomeError, DomeResult};
use navigation::state::NavigationState;

/// Payload of the `navigationChanged` command posted to the web host.
pub fn navigation_to_json(state: &NavigationState) -> DomeResult<String> {
    serde_json::to_string(state).map_err(|e| DomeError::WebView(format!("navigation json: {e}")))
}
