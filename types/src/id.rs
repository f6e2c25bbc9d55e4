//! Opaque identifier newtypes.
//!
//! Content ids and transaction ids are handles minted by external
//! collaborators; the orchestrator never interprets their internal
//! structure, it only stores and forwards them.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id! {
    /// Stable external identifier of a restoration project. Primary key of
    /// a workflow instance; never reused.
    ProjectId
}

opaque_id! {
    /// Handle returned by the content-addressed store for a stored blob.
    ContentId
}

opaque_id! {
    /// Handle returned by the ledger for a submitted transaction.
    TxId
}

opaque_id! {
    /// Identifier of a minted credit batch on the ledger.
    BatchId
}

opaque_id! {
    /// Identifier of the field agent or device that submitted evidence.
    /// Keys the submission history used by the fraud heuristic.
    SubmitterId
}

opaque_id! {
    /// The registry's own identifier for a registered project, distinct
    /// from the orchestrator-side [`ProjectId`].
    RegistryProjectId
}
