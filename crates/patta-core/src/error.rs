use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid rule pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Gazetteer error: {0}")]
    Gazetteer(#[from] crate::gazetteer::GazetteerError),
}

pub type Result<T> = std::result::Result<T, Error>;
