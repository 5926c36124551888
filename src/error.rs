use std::fmt;

#[derive(Debug)]
pub enum Error {
    InvalidSchema(String),
    BsonDeError(bson::de::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BsonDeError(e) => write!(f, "{}", e),
            Error::InvalidSchema(reason) => write!(f, "Invalid schema: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BsonDeError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bson::de::Error> for Error {
    fn from(err: bson::de::Error) -> Self {
        Error::BsonDeError(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
