// Live MBTA subway arrivals for a console on a Raspberry Pi.
extern crate anyhow;
extern crate flexi_logger;
extern crate getopts;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod config;
mod dash;
mod drawing;
mod mbta;
mod result;
mod signals;
mod stations;
mod structs;

use anyhow::Context;

const EXIT_FATAL: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn options() -> getopts::Options {
    let mut opts = getopts::Options::new();
    opts.optopt("c", "config", "JSON config file (default mbtadash.json)", "FILE");
    opts.optopt("k", "api-key-file", "JSON file holding {\"key\": ...}, instead of $MBTA_API_KEY", "FILE");
    opts.optmulti("s", "station", "Show this stop id instead of the configured boards", "ID");
    opts.optmulti("r", "route", "Only this route (with --station)", "ID");
    opts.optopt("d", "direction", "0, 1, inbound or outbound (with --station)", "DIR");
    opts.optopt("i", "interval", "Seconds between refreshes", "SECS");
    opts.optflag("o", "one-shot", "Print one screen and exit");
    opts.optflag("", "clear", "Clear the console before each screen");
    opts.optopt("", "log-dir", "Also write log files into DIR", "DIR");
    opts.optflag("h", "help", "Print this help");
    return opts;
}

fn start_logging(log_dir: Option<String>) -> result::DashResult<flexi_logger::LoggerHandle> {
    let mut logger = flexi_logger::Logger::try_with_env_or_str("info")?;
    if let Some(dir) = log_dir {
        logger = logger
            .log_to_file(flexi_logger::FileSpec::default().directory(dir))
            .duplicate_to_stderr(flexi_logger::Duplicate::Warn);
    }
    return Ok(logger.start()?);
}

/// A bad `--interval` is a usage error, not a fatal one.
fn interval_override(matches: &getopts::Matches) -> Result<Option<u64>, String> {
    return match matches.opt_str("interval") {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) => Ok(Some(secs)),
            Err(_) => Err(format!("Bad --interval '{}': expected whole seconds", raw)),
        },
    };
}

fn load_config(matches: &getopts::Matches, interval: Option<u64>) -> result::DashResult<config::DashConfig> {
    let stations = matches.opt_strs("station");

    let mut dash_config = if stations.is_empty() {
        let path = matches.opt_str("config").unwrap_or(config::DEFAULT_CONFIG_PATH.to_string());
        config::config_from_file(&path)?
    } else {
        let mut dash_config = match matches.opt_str("config") {
            Some(path) => config::config_from_file(&path)?,
            None => config::DashConfig::default(),
        };
        dash_config.boards = vec![config::BoardConfig {
            label: None,
            stations: stations,
            station_name: None,
            routes: matches.opt_strs("route"),
            directions: matches.opt_str("direction")
                .map(|d| vec![config::DirectionConfig::parse(&d)])
                .unwrap_or_default(),
        }];
        dash_config
    };

    if let Some(secs) = interval {
        dash_config.poll_seconds = secs;
    }

    return Ok(dash_config);
}

fn run(matches: &getopts::Matches, interval: Option<u64>) -> result::DashResult<()> {
    let dash_config = load_config(matches, interval)?;
    let settings = dash_config.settings(matches.opt_present("clear"))?;
    let credential = config::load_credential(
        matches.opt_str("api-key-file").as_ref().map(String::as_str),
        std::env::var(config::API_KEY_ENV).ok())?;

    signals::install_handlers().context("installing signal handlers")?;

    info!("Resolving stations");
    let resolved = stations::Resolver::new(&settings.api_base, &credential, mbta::real_fetch, signals::process_flag())
        .resolve_boards(&dash_config.boards);
    let boards = match resolved {
        Ok(boards) => boards,
        Err(result::ConfigError::Interrupted) => {
            info!("Interrupted while resolving stations");
            return Ok(());
        },
        Err(err) => return Err(err.into()),
    };

    let max_cycles = if matches.opt_present("one-shot") { Some(1) } else { None };
    info!("Polling {} boards every {:?}. Press Ctrl+C to stop.", boards.len(), settings.interval);

    let dash = dash::MbtaDash::new(boards, credential, settings, mbta::real_fetch, signals::process_flag());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    return dash.run(&mut out, max_cycles);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let opts = options();

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{}\n\n{}", err, opts.usage("Usage: mbtadash [options]"));
            std::process::exit(EXIT_USAGE);
        },
    };

    if matches.opt_present("help") {
        println!("{}", opts.usage("Usage: mbtadash [options]"));
        return;
    }

    let interval = match interval_override(&matches) {
        Ok(interval) => interval,
        Err(err) => {
            eprintln!("{}\n\n{}", err, opts.usage("Usage: mbtadash [options]"));
            std::process::exit(EXIT_USAGE);
        },
    };

    let logger = match start_logging(matches.opt_str("log-dir")) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("Could not start logging: {:#}", err);
            std::process::exit(EXIT_FATAL);
        },
    };

    let exit_code = match run(&matches, interval) {
        Ok(()) => 0,
        Err(err) => {
            error!("{:#}", err);
            EXIT_FATAL
        },
    };

    logger.flush();
    std::process::exit(exit_code);
}
