use thiserror::Error;

/// Stage of a push at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    ClientCreation,
    Formatting,
    Delivery,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Configuration => write!(f, "configuration"),
            Stage::ClientCreation => write!(f, "client creation"),
            Stage::Formatting => write!(f, "formatting"),
            Stage::Delivery => write!(f, "delivery"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error("telegrambot: invalid configuration: {0}")]
    Configuration(String),

    #[error("telegrambot: bot creation failed: {reason}")]
    ClientCreation {
        reason: String,
        #[source]
        source: Option<teloxide::RequestError>,
    },

    #[error("telegrambot: message formatting failed: {0}")]
    Formatting(String),

    #[error("telegrambot: sending message failed: {reason}")]
    Delivery {
        reason: String,
        #[source]
        source: Option<teloxide::RequestError>,
    },
}

impl PushError {
    pub fn kind(&self) -> Stage {
        match self {
            PushError::Configuration(_) => Stage::Configuration,
            PushError::ClientCreation { .. } => Stage::ClientCreation,
            PushError::Formatting(_) => Stage::Formatting,
            PushError::Delivery { .. } => Stage::Delivery,
        }
    }

    pub(crate) fn client_creation(reason: impl Into<String>) -> Self {
        PushError::ClientCreation {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn delivery(err: teloxide::RequestError) -> Self {
        PushError::Delivery {
            reason: err.to_string(),
            source: Some(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, PushError>;
