use crate::stage::Stage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("project {project} is in status {status}, which does not permit stage {requested}")]
    InvalidTransition {
        project: String,
        status: String,
        requested: Stage,
    },

    #[error("project {0} already has an active workflow")]
    DuplicateProject(String),

    #[error("no workflow instance for project {0}")]
    UnknownProject(String),

    #[error("project {project} already has stage {stage} in flight")]
    StepInFlight { project: String, stage: Stage },

    #[error("project {project} stage {stage} is already complete")]
    StepAlreadyComplete { project: String, stage: Stage },

    #[error("project {project} is terminal ({status}); no further mutation permitted")]
    TerminalState { project: String, status: String },

    #[error("stage {stage} event for project {project} arrived before its predecessor resolved")]
    OutOfOrderEvent { project: String, stage: Stage },

    #[error("project {project} is not cancellable from status {status}")]
    NotCancellable { project: String, status: String },

    #[error("project {project} is not awaiting a review decision")]
    NotAwaitingReview { project: String },

    #[error("project {project} has no permanently failed step to retry")]
    NothingToRetry { project: String },
}
