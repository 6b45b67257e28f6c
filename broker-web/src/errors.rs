//! Maps [`broker_core::Error`] onto HTTP status codes and bodies.
use actix_web::{http::StatusCode, HttpResponse, HttpResponseBuilder, ResponseError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request")]
    BadRequest,
    #[error("unauthorized")]
    Unauthorized { reason: &'static str },
    #[error("internal server error")]
    Internal,
    #[error("upstream provider error")]
    UpstreamFailure,
}

impl From<broker_core::Error> for AppError {
    fn from(e: broker_core::Error) -> Self {
        use broker_core::Error;

        match e {
            Error::Http(_) | Error::UpstreamStatus(_) | Error::MissingField(_) | Error::Json(_) => {
                Self::UpstreamFailure
            }
            Error::Url(_)
            | Error::UnknownService(_)
            | Error::StateNotFound
            | Error::MalformedAuthId
            | Error::RefreshTokenTooShort
            | Error::FetchTokenTooShort
            | Error::MalformedCliToken
            | Error::NoStore => Self::BadRequest,
            Error::DecryptingFailed => Self::Unauthorized {
                reason: "Invalid key or password",
            },
            Error::StateKeyCollision | Error::Io(_) => Self::Internal,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponseBuilder::new(self.status_code());

        if let Self::Unauthorized { reason } = self {
            builder.insert_header(("X-Reason", *reason));
        }

        builder.body(self.to_string())
    }
}
