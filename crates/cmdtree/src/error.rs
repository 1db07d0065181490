use std::path::PathBuf;

/// Errors produced while validating a command tree or resolving an invocation.
///
/// Parse errors are wrapped in [`Error::At`] once per flag and command they
/// pass through, so the rendered message reads as a breadcrumb trail from the
/// root to the failure point: `app: sub: --count: invalid value "x": ...`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no such flag: {0}")]
    NoSuchFlag(String),

    #[error("no such command: {0}")]
    NoSuchCommand(String),

    #[error("flag value required")]
    ValueRequired,

    #[error("flag is mandatory")]
    FlagMandatory,

    #[error("unexpected argument: {0} (no subcommand and no arguments expected)")]
    NoArgumentsExpected(String),

    #[error("invalid value {value:?}: {reason}")]
    InvalidValue { value: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("flagfile {}: {reason}", path.display())]
    Flagfile { path: PathBuf, reason: String },

    #[error("envfile {}: {reason}", path.display())]
    Envfile { path: PathBuf, reason: String },

    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write output: {0}")]
    Output(#[source] std::io::Error),

    /// Stop processing without reporting a failure (help printed, etc.).
    #[error("exit")]
    Exit,

    #[error(transparent)]
    Hook(#[from] anyhow::Error),

    #[error("{at}: {source}")]
    At {
        at: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap `self` with the name of the flag or command it passed through.
    pub fn at(self, at: impl Into<String>) -> Self {
        Self::At {
            at: at.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through breadcrumbs.
    pub fn root_cause(&self) -> &Error {
        let mut err = self;
        while let Self::At { source, .. } = err {
            err = source;
        }
        err
    }

    /// Whether this is the exit-without-error sentinel, possibly wrapped.
    pub fn is_exit(&self) -> bool {
        matches!(self.root_cause(), Self::Exit)
    }

    pub(crate) fn invalid(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
