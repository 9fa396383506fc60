use std::fmt;

pub type PrefResult<T> = std::result::Result<T, Error>;

/// Error type shared by the core and every backend adapter
#[derive(Debug)]
pub enum Error {
	/// A typed read hit a key holding a value of a different kind
	TypeMismatch { key: Box<str>, expected: &'static str, found: &'static str },
	/// A caller-supplied enum decoder rejected a stored string
	Decode(Box<str>),
	/// A handle or store was used after destroy()
	Destroyed,
	/// Backend storage failure
	Storage(Box<str>),

	// externals
	Io(std::io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::TypeMismatch { key, expected, found } => {
				write!(f, "type mismatch for key '{}': expected {}, found {}", key, expected, found)
			}
			Error::Decode(msg) => write!(f, "decode error: {}", msg),
			Error::Destroyed => write!(f, "used after destroy()"),
			Error::Storage(msg) => write!(f, "storage error: {}", msg),
			Error::Io(e) => write!(f, "io error: {}", e),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

// vim: ts=4
