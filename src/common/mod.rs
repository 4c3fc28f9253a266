pub mod constants;

/// Runtime errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A barrier received more arrivals than it was created for.
    BarrierExhausted { expected: usize },
    /// Configuration could not be loaded or deserialized.
    Config(String),
    /// Invalid data, typically a record that doesn't have the expected shape.
    InvalidData(String),
    /// Invalid user or caller input.
    InvalidInput(String),
    /// An IO error.
    IO(String),
    /// Work was submitted to a worker pool that has been shut down.
    PoolClosed,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BarrierExhausted { expected } => {
                write!(f, "barrier already fired after {expected} arrivals")
            }
            Error::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
            Error::PoolClosed => f.write_str("worker pool is shut down"),
        }
    }
}

/// Constructs an Error::InvalidInput for the given format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => { $crate::common::Error::InvalidInput(format!($($args)*)).into() };
}

/// Constructs an Error::InvalidData for the given format string.
#[macro_export]
macro_rules! errdata {
    ($($args:tt)*) => { $crate::common::Error::InvalidData(format!($($args)*)).into() };
}

/// Asserts that the given expression evaluates to an `Err`.
#[macro_export]
macro_rules! assert_errors {
    ($expr:expr) => {
        assert!(($expr).is_err(), "expected an error from `{}`", stringify!($expr))
    };
}

/// A runtime Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}
