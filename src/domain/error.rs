use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("missing argument `{name}`")]
    MissingArgument { name: &'static str },
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("`{present}` requires `{missing}` to be supplied as well")]
    UnpairedArgument {
        present: &'static str,
        missing: &'static str,
    },
}

impl DomainError {
    pub fn missing(name: &'static str) -> Self {
        Self::MissingArgument { name }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    pub fn unpaired(present: &'static str, missing: &'static str) -> Self {
        Self::UnpairedArgument { present, missing }
    }
}
