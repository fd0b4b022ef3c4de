use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;

use crate::config;
use crate::mbta;
use crate::result;
use crate::signals;
use crate::structs;

/// Turns configured boards into concrete filters, looking station names and
/// direction names up against the API. Runs once, before polling starts.
pub struct Resolver<'a> {
    api_base: &'a str,
    credential: &'a structs::Credential,
    fetch_fn: mbta::FetchFn,
    interrupt: &'a AtomicBool,
    directions: HashMap<String, mbta::DirectionNames>,
}

impl<'a> Resolver<'a> {
    pub fn new(api_base: &'a str,
               credential: &'a structs::Credential,
               fetch_fn: mbta::FetchFn,
               interrupt: &'a AtomicBool) -> Resolver<'a> {
        return Resolver {
            api_base: api_base,
            credential: credential,
            fetch_fn: fetch_fn,
            interrupt: interrupt,
            directions: HashMap::new(),
        };
    }

    fn direction_names(&mut self, route_id: &str) -> &mbta::DirectionNames {
        let api_base = self.api_base;
        let credential = self.credential;
        let fetch_fn = self.fetch_fn;
        return self.directions.entry(route_id.to_string())
            .or_insert_with(|| mbta::route_directions(api_base, route_id, credential, fetch_fn));
    }

    fn direction_id(&mut self, board: &config::BoardConfig, direction: &config::DirectionConfig) -> Result<u8, result::ConfigError> {
        let name = match *direction {
            config::DirectionConfig::Id(id) if id <= 1 => return Ok(id),
            config::DirectionConfig::Id(id) => return Err(result::ConfigError::InvalidDirection(id.to_string())),
            config::DirectionConfig::Name(ref name) => name.clone(),
        };

        if board.routes.is_empty() {
            return mbta::DirectionNames::default_names().resolve(&name)
                .ok_or(result::ConfigError::InvalidDirection(name.clone()));
        }

        let mut ids = BTreeSet::new();
        for route_id in &board.routes {
            match self.direction_names(route_id).resolve(&name) {
                Some(id) => { ids.insert(id); },
                None => return Err(result::ConfigError::InvalidDirection(name.clone())),
            }
        }

        if ids.len() > 1 {
            return Err(result::ConfigError::DirectionMismatch(board.label(), name));
        }
        return ids.into_iter().next().ok_or(result::ConfigError::InvalidDirection(name));
    }

    fn station_ids(&self, board: &config::BoardConfig) -> BTreeSet<String> {
        let mut ids: BTreeSet<String> = board.stations.iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(ref name) = board.station_name {
            if board.routes.is_empty() {
                warn!("Not looking up '{}' by name: the board has no routes", name);
                return ids;
            }
            let found = mbta::find_parent_stations(self.api_base, name, &board.routes, self.credential, self.fetch_fn);
            if found.is_empty() {
                warn!("Could not find any parent stop ids for '{}' (routes: {:?})", name, board.routes);
            }
            ids.extend(found);
        }

        return ids;
    }

    pub fn resolve_board(&mut self, board: &config::BoardConfig) -> Result<Vec<structs::Board>, result::ConfigError> {
        let label = board.label();
        let station_ids = self.station_ids(board);
        if station_ids.is_empty() {
            warn!("Skipping board '{}': no stations", label);
            return Ok(vec![]);
        }

        let routes = if board.routes.is_empty() {
            "All routes".to_string()
        } else {
            board.routes.join(", ")
        };

        if board.directions.is_empty() {
            return Ok(vec![structs::Board {
                title: format!("{} | {}", label, routes),
                filter: structs::StationFilter::new(&label, station_ids, board.routes.clone(), None)?,
            }]);
        }

        let mut boards = vec![];
        for direction in &board.directions {
            let direction_id = self.direction_id(board, direction)?;
            boards.push(structs::Board {
                title: format!("{} | {} | {}", label, routes, direction),
                filter: structs::StationFilter::new(&label, station_ids.clone(), board.routes.clone(), Some(direction_id))?,
            });
        }
        return Ok(boards);
    }

    pub fn resolve_boards(&mut self, boards: &[config::BoardConfig]) -> Result<Vec<structs::Board>, result::ConfigError> {
        let mut resolved = vec![];
        for board in boards {
            if signals::is_set(self.interrupt) {
                return Err(result::ConfigError::Interrupted);
            }
            let board_boards = self.resolve_board(board)?;
            for b in &board_boards {
                info!("  - {}: stops {:?}", b.title, b.filter.station_ids());
            }
            resolved.extend(board_boards);
        }

        if signals::is_set(self.interrupt) {
            return Err(result::ConfigError::Interrupted);
        }
        if resolved.is_empty() {
            return Err(result::ConfigError::NothingResolved);
        }
        return Ok(resolved);
    }
}
