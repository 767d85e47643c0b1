use thiserror::Error;

/// Errors surfaced while turning caller data into a [`Value`](crate::Value)
/// tree. Rendering itself never fails; every malformed template or missing
/// key degrades to a textual fallback instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("map key must be a string, got {0}")]
    NonStringKey(String),
}

impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::Serialize(msg.to_string())
    }
}
