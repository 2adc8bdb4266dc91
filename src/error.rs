use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Authentication(String),
    Protocol(String),
    UnknownEdge(String),
    WriteRejected(i64),
    InvalidTemperature(f64),
    Io(std::io::Error),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_) | Error::UnknownEdge(_) | Error::WriteRejected(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Authentication(msg) => write!(f, "authentication error: {msg}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::UnknownEdge(id) => write!(f, "unknown edge_id: {id}"),
            Error::WriteRejected(rsc) => write!(f, "write rejected with rsc={rsc}"),
            Error::InvalidTemperature(t) => write!(f, "temperature out of range: {t}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn excerpt(text: &str) -> String {
    text.chars().take(300).collect()
}
