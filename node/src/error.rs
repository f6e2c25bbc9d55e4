use thiserror::Error;
use tidemark_workflow::{Stage, WorkflowError};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("stage {stage} failed permanently after {attempts} attempts: {message}")]
    StagePermanentlyFailed {
        stage: Stage,
        attempts: u32,
        message: String,
    },

    #[error("stage {0} result missing from instance")]
    MissingStageResult(Stage),

    #[error("original command for the failed stage is no longer available")]
    CommandUnavailable,

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("event channel closed")]
    ChannelClosed,

    #[error("recovery failed: {0}")]
    Recovery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
