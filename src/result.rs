extern crate anyhow;
extern crate chrono;
extern crate reqwest;
extern crate serde_json;
extern crate std;

pub type DashResult<T> = anyhow::Result<T>;
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Anything that stops one board from being refreshed this cycle.
#[derive(Debug)]
pub enum FetchError {
    HttpError(reqwest::Error),
    StatusError(u16),
    JsonError(serde_json::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            FetchError::HttpError(ref err) => {
                return write!(f, "HTTP Error: {}", err);
            },
            FetchError::StatusError(status) => {
                return write!(f, "HTTP Status {}", status);
            },
            FetchError::JsonError(ref err) => {
                return write!(f, "JSON Error: {}", err);
            },
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            FetchError::HttpError(ref err) => Some(err),
            FetchError::StatusError(_) => None,
            FetchError::JsonError(ref err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> FetchError {
        return FetchError::HttpError(err);
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> FetchError {
        return FetchError::JsonError(err);
    }
}

// A single prediction record that can't be shown. The record is dropped,
// the rest of the response is kept.
#[derive(Debug)]
pub enum FormatError {
    Malformed(serde_json::Error),
    MissingRoute(String),
    NoTimes(String),
    BadTimestamp(String, chrono::ParseError),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            FormatError::Malformed(ref err) => {
                return write!(f, "Malformed prediction: {}", err);
            },
            FormatError::MissingRoute(ref id) => {
                return write!(f, "Prediction {} has no route", id);
            },
            FormatError::NoTimes(ref id) => {
                return write!(f, "Prediction {} has no arrival or departure time", id);
            },
            FormatError::BadTimestamp(ref value, ref err) => {
                return write!(f, "Bad timestamp '{}': {}", value, err);
            },
        }
    }
}

impl std::error::Error for FormatError {}

impl From<serde_json::Error> for FormatError {
    fn from(err: serde_json::Error) -> FormatError {
        return FormatError::Malformed(err);
    }
}

// Fatal: reported before the poll loop starts.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    NoBoards,
    NoStations(String),
    InvalidDirection(String),
    InvalidInterval,
    UnknownTimezone(String),
    MissingCredential,
    DirectionMismatch(String, String),
    NameNeedsRoutes(String),
    InvalidBoardSize,
    NothingResolved,
    Interrupted,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ConfigError::NoBoards => {
                return write!(f, "No boards configured");
            },
            ConfigError::NoStations(ref board) => {
                return write!(f, "Board '{}' names no stations", board);
            },
            ConfigError::InvalidDirection(ref direction) => {
                return write!(f, "Invalid direction '{}' (expected 0, 1 or a direction name)", direction);
            },
            ConfigError::InvalidInterval => {
                return write!(f, "Polling interval must be at least one second");
            },
            ConfigError::UnknownTimezone(ref tz) => {
                return write!(f, "Unknown timezone '{}'", tz);
            },
            ConfigError::MissingCredential => {
                return write!(f, "No API key: set MBTA_API_KEY or pass --api-key-file");
            },
            ConfigError::DirectionMismatch(ref board, ref direction) => {
                return write!(f, "Routes on board '{}' disagree on direction '{}'", board, direction);
            },
            ConfigError::NameNeedsRoutes(ref board) => {
                return write!(f, "Board '{}' looks its station up by name, which needs at least one route", board);
            },
            ConfigError::InvalidBoardSize => {
                return write!(f, "max_per_board must be at least 1");
            },
            ConfigError::Interrupted => {
                return write!(f, "Interrupted during startup");
            },
            ConfigError::NothingResolved => {
                return write!(f, "No stations resolved. Check station names or network connectivity.");
            },
        }
    }
}

impl std::error::Error for ConfigError {}
