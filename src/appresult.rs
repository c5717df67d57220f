use axum::{http::StatusCode, response::{IntoResponse, Response}};
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = ?self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("something went wrong: {}", self.0),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(oauth2::url::ParseError);

impl<E, R> From<oauth2::RequestTokenError<E, R>> for AppError
where
    E: core::error::Error + Send + Sync + 'static,
    R: oauth2::ErrorResponse + Send + Sync + 'static,
{
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self(anyhow::Error::from(err))
    }
}
