use std::fmt;

/// Failure reported by the remote API (login, registration, analytics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::new("NETWORK_ERROR", format!("request to the API failed: {value}"))
    }
}

/// Code for an xdl process that was killed by a signal instead of exiting.
pub const XDL_SIGNALLED: &str = "XDL_SIGNALLED";

/// Failure reported by the xdl project collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdlError {
    pub code: String,
    pub message: String,
}

impl XdlError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_signalled(&self) -> bool {
        self.code == XDL_SIGNALLED
    }
}

impl fmt::Display for XdlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for XdlError {}

/// Every failure that can reach the action boundary.
#[derive(Debug)]
pub enum CliError {
    /// User-facing problem with how the command was invoked.
    Command { code: String, message: String },
    Api(ApiError),
    Library(XdlError),
    Uncategorized(anyhow::Error),
}

impl CliError {
    pub fn command(code: impl Into<String>, message: impl Into<String>) -> Self {
        CliError::Command {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            CliError::Command { code, .. } => Some(code),
            CliError::Api(err) => Some(&err.code),
            CliError::Library(err) => Some(&err.code),
            CliError::Uncategorized(_) => None,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Command { message, .. } => write!(f, "{message}"),
            CliError::Api(err) => write!(f, "{err}"),
            CliError::Library(err) => write!(f, "{err}"),
            CliError::Uncategorized(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Command { .. } => None,
            CliError::Api(err) => Some(err),
            CliError::Library(err) => Some(err),
            CliError::Uncategorized(err) => Some(err.as_ref()),
        }
    }
}

impl From<ApiError> for CliError {
    fn from(value: ApiError) -> Self {
        CliError::Api(value)
    }
}

impl From<XdlError> for CliError {
    fn from(value: XdlError) -> Self {
        CliError::Library(value)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(value: anyhow::Error) -> Self {
        CliError::Uncategorized(value)
    }
}

impl From<clap::Error> for CliError {
    fn from(value: clap::Error) -> Self {
        CliError::Uncategorized(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn fails_with_xdl() -> Result<(), CliError> {
        Err::<(), _>(XdlError::new("NO_PACKAGE_JSON", "package.json does not exist"))?;
        Ok(())
    }

    fn fails_with_io() -> Result<(), CliError> {
        std::fs::read_to_string("/definitely/not/here").context("failed to read manifest")?;
        Ok(())
    }

    #[test]
    fn question_mark_tags_collaborator_errors() {
        let err = fails_with_xdl().unwrap_err();
        assert!(matches!(err, CliError::Library(_)));
        assert_eq!(err.code(), Some("NO_PACKAGE_JSON"));
        assert_eq!(err.to_string(), "package.json does not exist");
    }

    #[test]
    fn anything_else_is_uncategorized() {
        let err = fails_with_io().unwrap_err();
        assert!(matches!(err, CliError::Uncategorized(_)));
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "failed to read manifest");
    }
}
