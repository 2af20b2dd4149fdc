use std::io;

use thiserror::Error;

/// The closed set of failure kinds callers dispatch on.
///
/// Every [`Error`] maps to exactly one kind, and wrapping an error with
/// [`Error::context`] never changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateAsset,
    NotFoundAsset,
    DuplicateUser,
    UserNotFound,
    InvalidPassword,
    DuplicateAccessToken,
    NotFoundAccessToken,
    Timeout,
    Infrastructure,
    Config,
}

impl ErrorKind {
    /// Only a token-value collision is worth re-running the whole operation for.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::DuplicateAccessToken)
    }

    #[must_use]
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::DuplicateAsset
                | Self::NotFoundAsset
                | Self::DuplicateUser
                | Self::UserNotFound
                | Self::InvalidPassword
                | Self::NotFoundAccessToken
        )
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("asset '{name}' already exists")]
    DuplicateAsset { owner: String, name: String },

    #[error("asset '{name}' not found")]
    NotFoundAsset { owner: String, name: String },

    #[error("user with login '{login}' already exists")]
    DuplicateUser { login: String },

    #[error("user with login '{login}' not found")]
    UserNotFound { login: String },

    #[error("invalid password for login '{login}'")]
    InvalidPassword { login: String },

    #[error("access token collision")]
    DuplicateAccessToken,

    #[error("access token not found")]
    NotFoundAccessToken,

    #[error("{op} exceeded its deadline")]
    Timeout { op: &'static str },

    #[error("database error")]
    Database(#[source] rusqlite::Error),

    #[error("unable to begin transaction")]
    Begin(#[source] rusqlite::Error),

    #[error("unable to commit transaction")]
    Commit(#[source] rusqlite::Error),

    #[error("connection pool error")]
    Pool(#[from] r2d2::Error),

    #[error("io error")]
    Io(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error("{op} for '{key}'")]
    Context {
        op: &'static str,
        key: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateAsset { .. } => ErrorKind::DuplicateAsset,
            Self::NotFoundAsset { .. } => ErrorKind::NotFoundAsset,
            Self::DuplicateUser { .. } => ErrorKind::DuplicateUser,
            Self::UserNotFound { .. } => ErrorKind::UserNotFound,
            Self::InvalidPassword { .. } => ErrorKind::InvalidPassword,
            Self::DuplicateAccessToken => ErrorKind::DuplicateAccessToken,
            Self::NotFoundAccessToken => ErrorKind::NotFoundAccessToken,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Database(_)
            | Self::Begin(_)
            | Self::Commit(_)
            | Self::Pool(_)
            | Self::Io(_)
            | Self::PasswordHash(_) => ErrorKind::Infrastructure,
            Self::Config(_) => ErrorKind::Config,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Attaches the failing operation and its key to infrastructure errors.
    ///
    /// Client-kind errors already name their key and are returned as is. The
    /// key must never be a credential or token value.
    #[must_use]
    pub fn context(self, op: &'static str, key: impl Into<String>) -> Self {
        if self.kind().is_client_error() || self.kind().is_retryable() {
            return self;
        }
        Self::Context {
            op,
            key: key.into(),
            source: Box::new(self),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                Self::Timeout { op: "statement" }
            }
            _ => Self::Database(e),
        }
    }
}

// Blob readers and writers tunnel crate errors through `io::Error`; unwrap
// them here so the kind survives `io::copy` and friends.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Self::Io(e);
        }
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Self::Io(io::Error::other(other)),
            None => Self::Io(io::Error::other("io error without source")),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
