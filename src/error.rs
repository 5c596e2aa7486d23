use std::{io, path::PathBuf};

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Http(reqwest::Error),
    InvalidDate(String),
    InvalidTime(String),
    TargetNotFound(String, PathBuf),
    MissingAccessToken,
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Http(value)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => e.fmt(f),
            Error::Http(e) => e.fmt(f),
            Error::InvalidDate(s) => write!(f, "invalid date {s:?}, expected YYYY-MM-DD"),
            Error::InvalidTime(s) => write!(f, "invalid time {s:?}, expected HH:MM:SS"),
            Error::TargetNotFound(name, root) => {
                write!(f, "target directory {name:?} not found under {}", root.display())
            }
            Error::MissingAccessToken => {
                write!(f, "an access token is required to upload (MIXCLOUD_ACCESS_TOKEN)")
            }
        }
    }
}

impl std::error::Error for Error {}
