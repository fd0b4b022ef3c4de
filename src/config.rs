extern crate anyhow;
extern crate chrono_tz;
extern crate serde;
extern crate serde_json;

use anyhow::Context;

use crate::mbta;
use crate::result;
use crate::structs;

pub const API_KEY_ENV: &str = "MBTA_API_KEY";
pub const DEFAULT_CONFIG_PATH: &str = "mbtadash.json";

#[derive(Debug, Deserialize)]
pub struct DashConfig {
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
    #[serde(default = "default_max_per_board")]
    pub max_per_board: usize,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub boards: Vec<BoardConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BoardConfig {
    pub label: Option<String>,
    #[serde(default)]
    pub stations: Vec<String>,
    pub station_name: Option<String>,
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub directions: Vec<DirectionConfig>,
}

/// `0`, `1`, or a name such as "inbound" or "Westbound".
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DirectionConfig {
    Id(u8),
    Name(String),
}

impl DirectionConfig {
    pub fn parse(input: &str) -> DirectionConfig {
        return match input.trim().parse::<u8>() {
            Ok(id) => DirectionConfig::Id(id),
            Err(_) => DirectionConfig::Name(input.trim().to_string()),
        };
    }
}

impl std::fmt::Display for DirectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            DirectionConfig::Id(id) => write!(f, "Direction {}", id),
            DirectionConfig::Name(ref name) => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => write!(f, "{}{}", first.to_uppercase(), chars.as_str().to_lowercase()),
                    None => Ok(()),
                }
            },
        }
    }
}

impl BoardConfig {
    pub fn label(&self) -> String {
        if let Some(ref label) = self.label {
            return label.clone();
        }
        if let Some(ref name) = self.station_name {
            return name.clone();
        }
        return self.stations.join(",");
    }
}

fn default_poll_seconds() -> u64 {
    return 30;
}

fn default_max_per_board() -> usize {
    return 5;
}

fn default_timezone() -> String {
    return "America/New_York".to_string();
}

fn default_api_base() -> String {
    return mbta::DEFAULT_API_BASE.to_string();
}

impl Default for DashConfig {
    fn default() -> DashConfig {
        return DashConfig {
            poll_seconds: default_poll_seconds(),
            max_per_board: default_max_per_board(),
            timezone: default_timezone(),
            api_base: default_api_base(),
            boards: vec![],
        };
    }
}

impl DashConfig {
    /// Checks everything that doesn't need the network.
    pub fn validate(&self) -> Result<(), result::ConfigError> {
        if self.boards.is_empty() {
            return Err(result::ConfigError::NoBoards);
        }
        if self.poll_seconds == 0 {
            return Err(result::ConfigError::InvalidInterval);
        }
        if self.max_per_board == 0 {
            return Err(result::ConfigError::InvalidBoardSize);
        }
        parse_timezone(&self.timezone)?;

        for board in &self.boards {
            let has_name = board.station_name.as_ref().map_or(false, |n| !n.trim().is_empty());
            if board.stations.iter().all(|s| s.trim().is_empty()) && !has_name {
                return Err(result::ConfigError::NoStations(board.label()));
            }
            // Stop lookups by name are made per route.
            let has_routes = board.routes.iter().any(|r| !r.trim().is_empty());
            let has_ids = board.stations.iter().any(|s| !s.trim().is_empty());
            if has_name && !has_routes && !has_ids {
                return Err(result::ConfigError::NameNeedsRoutes(board.label()));
            }
            for direction in &board.directions {
                match *direction {
                    DirectionConfig::Id(id) if id > 1 => {
                        return Err(result::ConfigError::InvalidDirection(id.to_string()));
                    },
                    DirectionConfig::Name(ref name) if name.trim().is_empty() => {
                        return Err(result::ConfigError::InvalidDirection(name.clone()));
                    },
                    _ => {},
                }
            }
        }
        return Ok(());
    }

    pub fn settings(&self, clear_screen: bool) -> Result<structs::Settings, result::ConfigError> {
        self.validate()?;
        return Ok(structs::Settings {
            api_base: self.api_base.trim_end_matches('/').to_string(),
            interval: std::time::Duration::from_secs(self.poll_seconds),
            max_per_board: self.max_per_board,
            timezone: parse_timezone(&self.timezone)?,
            clear_screen: clear_screen,
        });
    }
}

pub fn parse_timezone(name: &str) -> Result<chrono_tz::Tz, result::ConfigError> {
    return name.parse::<chrono_tz::Tz>()
        .map_err(|_| result::ConfigError::UnknownTimezone(name.to_string()));
}

pub fn config_from_str(raw_json: &str) -> result::DashResult<DashConfig> {
    let config: DashConfig = serde_json::from_str(raw_json)
        .context("while parsing config")?;
    return Ok(config);
}

pub fn config_from_file<P: AsRef<std::path::Path>>(path: P) -> result::DashResult<DashConfig> {
    let debug_path = path.as_ref().display().to_string();
    let raw_json = std::fs::read_to_string(path)
        .with_context(|| format!("Opening config from '{}'", debug_path))?;
    return config_from_str(&raw_json)
        .with_context(|| format!("in '{}'", debug_path));
}

#[derive(Debug, Deserialize)]
struct KeyFile {
    key: String,
}

pub fn credential_from_file<P: AsRef<std::path::Path>>(path: P) -> result::DashResult<structs::Credential> {
    let debug_path = path.as_ref().display().to_string();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Opening API key from '{}'", debug_path))?;
    let reader = std::io::BufReader::new(file);
    let key_file: KeyFile = serde_json::from_reader(reader)
        .context("while parsing API key file")?;
    return Ok(structs::Credential::new(&key_file.key)?);
}

/// The key file wins over the environment when both are present.
pub fn load_credential(key_file: Option<&str>, env_value: Option<String>) -> result::DashResult<structs::Credential> {
    if let Some(path) = key_file {
        return credential_from_file(path);
    }
    return match env_value {
        Some(key) => Ok(structs::Credential::new(&key)?),
        None => Err(result::ConfigError::MissingCredential.into()),
    };
}
