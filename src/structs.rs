use std::collections::BTreeSet;

use crate::result;

/// Which stations, routes and direction one board shows.
#[derive(Clone, Debug, PartialEq)]
pub struct StationFilter {
    station_ids: BTreeSet<String>,
    route_ids: BTreeSet<String>,
    direction_id: Option<u8>,
}

impl StationFilter {
    pub fn new<S, R>(label: &str, station_ids: S, route_ids: R, direction_id: Option<u8>) -> Result<StationFilter, result::ConfigError>
    where
        S: IntoIterator<Item = String>,
        R: IntoIterator<Item = String>,
    {
        let station_ids: BTreeSet<String> = station_ids.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if station_ids.is_empty() {
            return Err(result::ConfigError::NoStations(label.to_string()));
        }

        match direction_id {
            Some(d) if d > 1 => {
                return Err(result::ConfigError::InvalidDirection(d.to_string()));
            },
            _ => {},
        }

        return Ok(StationFilter {
            station_ids: station_ids,
            route_ids: route_ids.into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            direction_id: direction_id,
        });
    }

    pub fn station_ids(&self) -> &BTreeSet<String> {
        return &self.station_ids;
    }

    pub fn route_ids(&self) -> &BTreeSet<String> {
        return &self.route_ids;
    }

    pub fn direction_id(&self) -> Option<u8> {
        return self.direction_id;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub route_id: String,
    pub destination: String,
    pub arrival_ts: Option<i64>,
    pub departure_ts: Option<i64>,
}

impl Prediction {
    /// Arrival if known, departure otherwise.
    pub fn event_ts(&self) -> Option<i64> {
        return self.arrival_ts.or(self.departure_ts);
    }

    pub fn minutes_until(&self, now_ts: i64) -> i64 {
        return match self.event_ts() {
            Some(ts) => minutes_between(now_ts, ts),
            None => 0,
        };
    }
}

// Rounded to the nearest minute, never negative.
pub fn minutes_between(now_ts: i64, event_ts: i64) -> i64 {
    let minutes = ((event_ts - now_ts) as f64 / 60.0).round() as i64;
    return std::cmp::max(0, minutes);
}

/// The API key. Kept out of logs.
#[derive(Clone, PartialEq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: &str) -> Result<Credential, result::ConfigError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(result::ConfigError::MissingCredential);
        }
        return Ok(Credential(key.to_string()));
    }

    pub fn key(&self) -> &str {
        return &self.0;
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        return write!(f, "Credential(<redacted>)");
    }
}

/// One block on the screen.
#[derive(Clone, Debug, PartialEq)]
pub struct Board {
    pub title: String,
    pub filter: StationFilter,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub api_base: String,
    pub interval: std::time::Duration,
    pub max_per_board: usize,
    pub timezone: chrono_tz::Tz,
    pub clear_screen: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(arrival_ts: Option<i64>, departure_ts: Option<i64>) -> Prediction {
        return Prediction {
            route_id: "Red".to_string(),
            destination: "Alewife".to_string(),
            arrival_ts: arrival_ts,
            departure_ts: departure_ts,
        };
    }

    #[test]
    fn filter_requires_a_station() {
        let err = StationFilter::new("Empty", vec![" ".to_string()], vec![], None).unwrap_err();
        assert_eq!(result::ConfigError::NoStations("Empty".to_string()), err);
    }

    #[test]
    fn filter_rejects_bad_direction() {
        let err = StationFilter::new("Bad", vec!["place-pktrm".to_string()], vec![], Some(2)).unwrap_err();
        assert_eq!(result::ConfigError::InvalidDirection("2".to_string()), err);
    }

    #[test]
    fn filter_dedupes_ids() {
        let filter = StationFilter::new(
            "Park",
            vec!["place-pktrm".to_string(), "place-pktrm".to_string()],
            vec!["Red".to_string(), "".to_string()],
            Some(1)).unwrap();
        assert_eq!(1, filter.station_ids().len());
        assert_eq!(1, filter.route_ids().len());
        assert_eq!(Some(1), filter.direction_id());
    }

    #[test]
    fn minutes_round_and_clamp() {
        assert_eq!(0, minutes_between(1000, 1000));
        assert_eq!(0, minutes_between(1000, 1029));
        assert_eq!(1, minutes_between(1000, 1030));
        assert_eq!(5, minutes_between(1000, 1300));
        assert_eq!(0, minutes_between(1000, 400));
    }

    #[test]
    fn arrival_preferred_over_departure() {
        assert_eq!(Some(100), prediction(Some(100), Some(200)).event_ts());
        assert_eq!(Some(200), prediction(None, Some(200)).event_ts());
        assert_eq!(3, prediction(None, Some(180)).minutes_until(0));
    }

    #[test]
    fn credential_is_redacted() {
        let credential = Credential::new("secret-key").unwrap();
        assert_eq!("secret-key", credential.key());
        assert!(!format!("{:?}", credential).contains("secret"));
        assert_eq!(result::ConfigError::MissingCredential, Credential::new("  ").unwrap_err());
    }
}
