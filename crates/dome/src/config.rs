use projection::compositor::CompositorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Consecutive failed frames tolerated before the pipeline shuts down.
    pub max_consecutive_failures: u32,
    /// Capacity of each collaborator event inbox.
    pub inbox_capacity: usize,
    pub weight_epsilon: f64,
    pub weight_samples: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let compositor = CompositorConfig::default();
        Self {
            max_consecutive_failures: 5,
            inbox_capacity: 256,
            weight_epsilon: compositor.weight_epsilon,
            weight_samples: compositor.weight_samples,
        }
    }
}

impl OrchestratorConfig {
    pub fn compositor(&self) -> CompositorConfig {
        CompositorConfig {
            weight_epsilon: self.weight_epsilon,
            weight_samples: self.weight_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrchestratorConfig;

    #[test]
    fn partial_documents_keep_defaults() {
        let cfg: OrchestratorConfig =
            serde_json::from_str(r#"{"max_consecutive_failures": 2}"#).unwrap();
        assert_eq!(cfg.max_consecutive_failures, 2);
        assert_eq!(cfg.inbox_capacity, 256);
        assert_eq!(cfg.compositor().weight_samples, 1440);
    }
}
