use prefstore::Error as PrefError;
use std::fmt;

/// Internal error type for the redb backend
#[derive(Debug)]
pub enum Error {
	Redb(String),
	Json(String),
	Io(std::io::Error),
	Task(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::Redb(msg) => write!(f, "redb error: {}", msg),
			Error::Json(msg) => write!(f, "json error: {}", msg),
			Error::Io(e) => write!(f, "io error: {}", e),
			Error::Task(msg) => write!(f, "task error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Error::Io(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Json(e.to_string())
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(e: tokio::task::JoinError) -> Self {
		Error::Task(e.to_string())
	}
}

impl From<Error> for PrefError {
	fn from(e: Error) -> Self {
		match e {
			Error::Io(io_err) => PrefError::Io(io_err),
			other => PrefError::Storage(other.to_string().into()),
		}
	}
}

/// Helper to convert redb errors
pub fn from_redb<E: fmt::Display>(err: E) -> Error {
	Error::Redb(err.to_string())
}

// vim: ts=4
