// Client for the MBTA v3 API: https://api-v3.mbta.com/docs/swagger/index.html
//
// Responses are JSON:API documents. Everything here is parsed into typed
// structs; a prediction record that doesn't fit is dropped on its own
// without failing the rest of the response.
extern crate chrono;
extern crate reqwest;
extern crate serde;
extern crate serde_json;
extern crate serde_with;

use std::collections::{BTreeSet, HashMap};

use serde_with::{serde_as, DefaultOnNull};

use crate::result;
use crate::structs;

pub const DEFAULT_API_BASE: &str = "https://api-v3.mbta.com";

const HTTP_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "mbtadash";
const PREDICTIONS_PAGE_LIMIT: &str = "50";
const STOPS_PAGE_LIMIT: &str = "200";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub api_key: String,
}

pub type FetchFn = fn(&HttpRequest) -> result::FetchResult<String>;

pub fn real_fetch(request: &HttpRequest) -> result::FetchResult<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;

    debug!("Fetching {} {:?}", request.url, request.query);
    let response = client.get(&request.url)
        .query(&request.query)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT, "application/vnd.api+json")
        .header("x-api-key", request.api_key.as_str())
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(result::FetchError::StatusError(status.as_u16()));
    }

    return Ok(response.text()?);
}

fn param(key: &str, value: &str) -> (String, String) {
    return (key.to_string(), value.to_string());
}

fn join(ids: &BTreeSet<String>) -> String {
    return ids.iter().map(String::as_str).collect::<Vec<&str>>().join(",");
}

/// Query for `/predictions`. The `filter[...]` keys mirror the filter
/// exactly: stops always, routes and direction only when set.
pub fn predictions_query(filter: &structs::StationFilter) -> Vec<(String, String)> {
    let mut query = vec![param("filter[stop]", &join(filter.station_ids()))];

    if !filter.route_ids().is_empty() {
        query.push(param("filter[route]", &join(filter.route_ids())));
    }

    if let Some(direction_id) = filter.direction_id() {
        query.push(param("filter[direction_id]", &direction_id.to_string()));
    }

    query.push(param("include", "trip"));
    query.push(param("fields[prediction]", "arrival_time,departure_time,direction_id,route,trip"));
    query.push(param("fields[trip]", "headsign"));
    query.push(param("page[limit]", PREDICTIONS_PAGE_LIMIT));
    return query;
}

pub fn fetch_predictions(api_base: &str,
                         filter: &structs::StationFilter,
                         credential: &structs::Credential,
                         fetch_fn: FetchFn) -> result::FetchResult<Vec<structs::Prediction>> {
    let request = HttpRequest {
        url: format!("{}/predictions", api_base),
        query: predictions_query(filter),
        api_key: credential.key().to_string(),
    };

    let body = fetch_fn(&request)?;
    return parse_predictions(&body);
}

#[derive(Deserialize, Debug)]
struct JsonApiDocument {
    data: Vec<serde_json::Value>,
    #[serde(default)]
    included: Vec<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct ResourceId {
    id: String,
}

#[derive(Deserialize, Debug, Default)]
struct Relationship {
    #[serde(default)]
    data: Option<ResourceId>,
}

#[derive(Deserialize, Debug)]
struct MbtaPrediction {
    id: String,
    attributes: MbtaPredictionAttributes,
    #[serde(default)]
    relationships: MbtaPredictionRelationships,
}

#[derive(Deserialize, Debug)]
struct MbtaPredictionAttributes {
    arrival_time: Option<String>,
    departure_time: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct MbtaPredictionRelationships {
    #[serde(default)]
    route: Relationship,
    #[serde(default)]
    trip: Relationship,
}

#[derive(Deserialize, Debug)]
struct MbtaTrip {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    attributes: MbtaTripAttributes,
}

#[derive(Deserialize, Debug)]
struct MbtaTripAttributes {
    headsign: Option<String>,
}

fn parse_timestamp(value: Option<&String>) -> Result<Option<i64>, result::FormatError> {
    return match value {
        None => Ok(None),
        Some(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.timestamp()))
            .map_err(|err| result::FormatError::BadTimestamp(s.to_string(), err)),
    };
}

fn convert_prediction(raw: serde_json::Value, headsigns: &HashMap<String, String>) -> Result<structs::Prediction, result::FormatError> {
    let raw: MbtaPrediction = serde_json::from_value(raw)?;

    let route_id = match raw.relationships.route.data {
        Some(route) => route.id,
        None => return Err(result::FormatError::MissingRoute(raw.id)),
    };

    let arrival_ts = parse_timestamp(raw.attributes.arrival_time.as_ref())?;
    let departure_ts = parse_timestamp(raw.attributes.departure_time.as_ref())?;
    if arrival_ts.is_none() && departure_ts.is_none() {
        return Err(result::FormatError::NoTimes(raw.id));
    }

    let destination = raw.relationships.trip.data
        .and_then(|trip| headsigns.get(&trip.id).cloned())
        .unwrap_or_default();

    return Ok(structs::Prediction {
        route_id: route_id,
        destination: destination,
        arrival_ts: arrival_ts,
        departure_ts: departure_ts,
    });
}

pub fn parse_predictions(body: &str) -> result::FetchResult<Vec<structs::Prediction>> {
    let document: JsonApiDocument = serde_json::from_str(body)?;

    let headsigns: HashMap<String, String> = document.included.into_iter()
        .filter_map(|value| serde_json::from_value::<MbtaTrip>(value).ok())
        .filter(|trip| trip.kind == "trip")
        .filter_map(|trip| {
            let id = trip.id;
            trip.attributes.headsign.map(|h| (id, h))
        })
        .collect();

    let mut predictions = vec![];
    for raw in document.data {
        match convert_prediction(raw, &headsigns) {
            Ok(prediction) => predictions.push(prediction),
            Err(err) => debug!("Dropping prediction: {}", err),
        }
    }

    return Ok(predictions);
}

#[derive(Deserialize, Debug)]
struct StopsDocument {
    data: Vec<MbtaStop>,
}

#[serde_as]
#[derive(Deserialize, Debug)]
struct MbtaStop {
    id: String,
    #[serde(default)]
    attributes: MbtaStopAttributes,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    relationships: MbtaStopRelationships,
}

#[serde_as]
#[derive(Deserialize, Debug, Default)]
struct MbtaStopAttributes {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    name: String,
}

#[derive(Deserialize, Debug, Default)]
struct MbtaStopRelationships {
    #[serde(default)]
    parent_station: Relationship,
}

/// Stop ids of the stations called `station_name` on any of `route_ids`.
/// Platforms are folded into their parent station. Sorted, no duplicates.
pub fn find_parent_stations(api_base: &str,
                            station_name: &str,
                            route_ids: &[String],
                            credential: &structs::Credential,
                            fetch_fn: FetchFn) -> BTreeSet<String> {
    let wanted = station_name.trim().to_lowercase();
    let mut parent_ids = BTreeSet::new();

    for route_id in route_ids {
        let request = HttpRequest {
            url: format!("{}/stops", api_base),
            query: vec![
                param("filter[route]", route_id),
                param("page[limit]", STOPS_PAGE_LIMIT),
            ],
            api_key: credential.key().to_string(),
        };

        let stops = match fetch_fn(&request).and_then(|body| Ok(serde_json::from_str::<StopsDocument>(&body)?)) {
            Ok(document) => document.data,
            Err(err) => {
                warn!("Stop lookup for route {} failed: {}", route_id, err);
                continue;
            },
        };

        for stop in stops {
            if stop.attributes.name.to_lowercase() != wanted {
                continue;
            }
            let id = match stop.relationships.parent_station.data {
                Some(parent) => parent.id,
                None => stop.id,
            };
            parent_ids.insert(id);
        }
    }

    return parent_ids;
}

/// A route's own labels for direction 0 and 1, e.g. ["Outbound", "Inbound"]
/// or ["West", "East"].
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionNames {
    names: Vec<String>,
}

impl DirectionNames {
    pub fn new(names: Vec<String>) -> DirectionNames {
        return DirectionNames { names: names };
    }

    pub fn default_names() -> DirectionNames {
        return DirectionNames::new(vec!["Outbound".to_string(), "Inbound".to_string()]);
    }

    fn position(&self, name: &str) -> Option<u8> {
        return self.names.iter()
            .position(|n| n.to_lowercase() == name)
            .map(|i| i as u8);
    }

    /// "inbound"/"outbound" always resolve: by label when the route uses
    /// them, otherwise outbound is 0 and inbound is 1.
    pub fn resolve(&self, name: &str) -> Option<u8> {
        let name = name.trim().to_lowercase();
        let labelled = self.position("inbound").is_some() && self.position("outbound").is_some();

        return match name.as_str() {
            "outbound" if !labelled => Some(0),
            "inbound" if !labelled => Some(1),
            other => self.position(other).filter(|i| *i <= 1),
        };
    }
}

#[derive(Deserialize, Debug)]
struct RouteDocument {
    data: MbtaRoute,
}

#[derive(Deserialize, Debug)]
struct MbtaRoute {
    attributes: MbtaRouteAttributes,
}

#[derive(Deserialize, Debug)]
struct MbtaRouteAttributes {
    direction_names: Vec<Option<String>>,
}

pub fn route_directions(api_base: &str,
                        route_id: &str,
                        credential: &structs::Credential,
                        fetch_fn: FetchFn) -> DirectionNames {
    let request = HttpRequest {
        url: format!("{}/routes/{}", api_base, route_id),
        query: vec![param("fields[route]", "direction_names")],
        api_key: credential.key().to_string(),
    };

    let parsed = fetch_fn(&request)
        .and_then(|body| Ok(serde_json::from_str::<RouteDocument>(&body)?));

    return match parsed {
        Ok(document) => DirectionNames::new(document.data.attributes.direction_names.into_iter()
            .map(Option::unwrap_or_default)
            .collect()),
        Err(err) => {
            warn!("Direction lookup for route {} failed, assuming Outbound/Inbound: {}", route_id, err);
            DirectionNames::default_names()
        },
    };
}
