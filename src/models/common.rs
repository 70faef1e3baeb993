use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub mode: BackendMode,
    pub description: String,
}

/// Whether a backend answers the generation POST directly or hands out a job id to poll.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Synchronous,
    Polling,
}
