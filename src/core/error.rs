use thiserror::Error;

#[derive(Debug, Error)]
pub enum DsaError {
    #[error("unknown country '{0}'")]
    InvalidCountry(String),
    #[error("unknown reform scenario '{0}'")]
    InvalidScenario(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid reference table: {0}")]
    InvalidTable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl DsaError {
    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            DsaError::InvalidCountry(_) | DsaError::InvalidScenario(_) => 2,
            DsaError::InvalidParameter(_) => 3,
            DsaError::InvalidTable(_) | DsaError::Io(_) | DsaError::Json(_) => 4,
        }
    }
}
