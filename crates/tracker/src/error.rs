use ledger::{AddError, AuthError, RemoveError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("sign-in failed: {0}")]
    Auth(#[from] AuthError),
    #[error("could not add transaction: {0}")]
    Add(#[from] AddError),
    #[error("could not remove transaction: {0}")]
    Remove(#[from] RemoveError),
    #[error("unknown timezone: {0}")]
    Timezone(String),
    #[error("invalid input: {0}")]
    Input(String),
}
