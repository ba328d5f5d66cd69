use serde::{Deserialize, Serialize};

/// Coarse classification of every failure the dome pipeline can report.
///
/// The pipeline's recovery policy is keyed on this kind rather than on the
/// error payload: validation kinds are always local to the call, collaborator
/// kinds are recovered per frame and escalate after repeated failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InitializationFailed,
    RenderEngine,
    WebView,
    Interaction,
    Rendering,
    InvalidCoordinates,
    InvalidMetadata,
}

impl ErrorKind {
    /// Stable, human-readable description of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InitializationFailed => "Initialization failed",
            ErrorKind::RenderEngine => "Render engine error",
            ErrorKind::WebView => "Web view error",
            ErrorKind::Interaction => "Interaction error",
            ErrorKind::Rendering => "Rendering error",
            ErrorKind::InvalidCoordinates => "Invalid coordinates",
            ErrorKind::InvalidMetadata => "Invalid metadata",
        }
    }

    /// Rejected input; the call had no effect.
    pub fn is_validation(self) -> bool {
        matches!(self, ErrorKind::InvalidCoordinates | ErrorKind::InvalidMetadata)
    }

    /// Failure inside one of the external collaborators.
    pub fn is_collaborator(self) -> bool {
        matches!(
            self,
            ErrorKind::RenderEngine | ErrorKind::WebView | ErrorKind::Interaction
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomeError {
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    #[error("render engine error: {0}")]
    RenderEngine(String),
    #[error("web view error: {0}")]
    WebView(String),
    #[error("interaction error: {0}")]
    Interaction(String),
    #[error("rendering error: {0}")]
    Rendering(String),
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    /// An operation that is not allowed in the pipeline's current state.
    #[error("{operation} rejected while pipeline is {state}")]
    Rejected {
        operation: &'static str,
        state: &'static str,
    },
}

impl DomeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomeError::InitializationFailed(_) => ErrorKind::InitializationFailed,
            DomeError::RenderEngine(_) => ErrorKind::RenderEngine,
            DomeError::WebView(_) => ErrorKind::WebView,
            DomeError::Interaction(_) => ErrorKind::Interaction,
            DomeError::Rendering(_) => ErrorKind::Rendering,
            DomeError::InvalidCoordinates(_) | DomeError::Rejected { .. } => {
                ErrorKind::InvalidCoordinates
            }
            DomeError::InvalidMetadata(_) => ErrorKind::InvalidMetadata,
        }
    }
}

pub type DomeResult<T> = Result<T, DomeError>;
