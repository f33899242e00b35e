use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use reqwest::Error as HttpError;
use rocket::{http::Status, response::Responder, Request};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while talking to collaborators or serving a request.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("{0}: {1}")]
    Status(Status, String),
}

impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Status(Status::InternalServerError, message.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = match self {
            Self::Db(_) | Self::Http(_) => Status::InternalServerError,
            Self::Jwt(_) => Status::Unauthorized,
            Self::Status(status, _) => status,
        };
        match status.class() {
            rocket::http::StatusClass::ServerError => error!("{self}"),
            _ => debug!("{self}"),
        }
        Err(status)
    }
}

/// A condition that must hold before a dispatch run may start.
///
/// Any of these aborts the whole run before a single email is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    #[error("caller is not logged in")]
    NotAuthenticated,
    #[error("email template {0:?} not found")]
    TemplateNotFound(String),
    #[error("candidate filter not found: {0}")]
    UnknownFilter(String),
    #[error("election {0} not found")]
    ElectionNotFound(String),
    #[error("candidates of election {0} are not ready to be invited")]
    NotReady(String),
    #[error("election {0} has no candidate submission deadline")]
    NoSubmissionDeadline(String),
}
