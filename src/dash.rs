extern crate chrono;

use std::io::Write;
use std::sync::atomic::AtomicBool;

use crate::drawing;
use crate::mbta;
use crate::result;
use crate::signals;
use crate::structs;

pub struct Screen {
    pub lines: Vec<String>,
    pub failed_boards: usize,
}

pub struct MbtaDash {
    boards: Vec<structs::Board>,
    credential: structs::Credential,
    settings: structs::Settings,
    fetch_fn: mbta::FetchFn,
    interrupt: &'static AtomicBool,
}

impl MbtaDash {
    pub fn new(boards: Vec<structs::Board>,
               credential: structs::Credential,
               settings: structs::Settings,
               fetch_fn: mbta::FetchFn,
               interrupt: &'static AtomicBool) -> MbtaDash {
        return MbtaDash {
            boards: boards,
            credential: credential,
            settings: settings,
            fetch_fn: fetch_fn,
            interrupt: interrupt,
        };
    }

    /// Fetches every board once and lays out the whole screen. A board that
    /// can't be fetched gets a one-line diagnostic instead of arrivals.
    pub fn one_iteration(&self, now: &chrono::DateTime<chrono::Utc>) -> Screen {
        let now_ts = now.timestamp();
        let mut lines = drawing::header(now, &self.settings);
        let mut failed_boards = 0;

        for board in &self.boards {
            lines.push("".to_string());
            match mbta::fetch_predictions(&self.settings.api_base, &board.filter, &self.credential, self.fetch_fn) {
                Ok(predictions) => {
                    debug!("{}: {} predictions", board.title, predictions.len());
                    lines.extend(drawing::render_board(board, &predictions, now_ts, &self.settings));
                },
                Err(err) => {
                    warn!("{}: {}", board.title, err);
                    failed_boards += 1;
                    lines.extend(drawing::render_unavailable(board, &err));
                },
            }
        }

        return Screen {
            lines: lines,
            failed_boards: failed_boards,
        };
    }

    /// Polls until interrupted, or for `max_cycles` cycles when given. Only
    /// a failed write to `out` ends the loop with an error.
    pub fn run(&self, out: &mut dyn Write, max_cycles: Option<u64>) -> result::DashResult<()> {
        let mut cycles = 0;
        loop {
            if signals::is_set(self.interrupt) {
                break;
            }

            let screen = self.one_iteration(&chrono::Utc::now());

            // Never show half a screen.
            if signals::is_set(self.interrupt) {
                info!("Interrupted while fetching, dropping this cycle");
                break;
            }

            let mut text = screen.lines.join("\n");
            text.push('\n');
            out.write_all(text.as_bytes())?;
            out.flush()?;

            if screen.failed_boards > 0 {
                info!("{} of {} boards unavailable this cycle", screen.failed_boards, self.boards.len());
            }

            cycles += 1;
            if max_cycles.map_or(false, |max| cycles >= max) {
                break;
            }

            if !signals::sleep_unless_interrupted(self.interrupt, self.settings.interval) {
                break;
            }
        }

        info!("Stopping after {} cycles", cycles);
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> structs::Settings {
        return structs::Settings {
            api_base: "https://example.test".to_string(),
            interval: std::time::Duration::from_secs(0),
            max_per_board: 5,
            timezone: chrono_tz::America::New_York,
            clear_screen: false,
        };
    }

    fn board(title: &str, direction_id: Option<u8>) -> structs::Board {
        return structs::Board {
            title: title.to_string(),
            filter: structs::StationFilter::new(title, vec!["place-pktrm".to_string()], vec!["Red".to_string()], direction_id).unwrap(),
        };
    }

    fn golden_fetch(_: &mbta::HttpRequest) -> result::FetchResult<String> {
        return Ok(std::fs::read_to_string("testdata/predictions.json").expect("Error reading predictions.json"));
    }

    static NEVER: AtomicBool = AtomicBool::new(false);

    fn dash(boards: Vec<structs::Board>, fetch_fn: mbta::FetchFn) -> MbtaDash {
        return MbtaDash::new(boards, structs::Credential::new("test-key").unwrap(), settings(), fetch_fn, &NEVER);
    }

    #[test]
    fn golden_screen() {
        let now = chrono::DateTime::parse_from_rfc3339("2025-10-18T14:00:00Z").unwrap().with_timezone(&chrono::Utc);
        let screen = dash(vec![board("Park Street | Red | Inbound", Some(1))], golden_fetch).one_iteration(&now);

        assert_eq!(0, screen.failed_boards);
        assert_eq!(
            vec![
                "=".repeat(80),
                "MBTA Live Predictions @ 2025-10-18 10:00:00 EDT".to_string(),
                "=".repeat(80),
                "".to_string(),
                "Park Street | Red | Inbound".to_string(),
                "  Red      Alewife                Arriving  10:00 AM".to_string(),
                "  Red      Braintree                 5 min  10:05 AM".to_string(),
                "  Red                               10 min  10:10 AM".to_string(),
            ],
            screen.lines);
    }

    #[test]
    fn empty_board_says_so() {
        let empty_fetch = |_: &mbta::HttpRequest| -> result::FetchResult<String> {
            return Ok(r#"{"data": [], "included": []}"#.to_string());
        };
        let screen = dash(vec![board("Bowdoin | Blue | Outbound", Some(0))], empty_fetch).one_iteration(&chrono::Utc::now());

        assert_eq!(Some(&"  No arrivals".to_string()), screen.lines.last());
    }

    #[test]
    fn failing_board_does_not_hide_others() {
        fn one_board_down(request: &mbta::HttpRequest) -> result::FetchResult<String> {
            if request.query.contains(&("filter[direction_id]".to_string(), "0".to_string())) {
                return Err(result::FetchError::StatusError(503));
            }
            return golden_fetch(request);
        }

        let screen = dash(vec![board("Outbound", Some(0)), board("Inbound", Some(1))], one_board_down)
            .one_iteration(&chrono::Utc::now());

        assert_eq!(1, screen.failed_boards);
        assert!(screen.lines.contains(&"  (unavailable: HTTP Status 503)".to_string()));
        assert!(screen.lines.iter().any(|l| l.contains("Alewife")));
    }

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn fails_first_time(request: &mbta::HttpRequest) -> result::FetchResult<String> {
        if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(result::FetchError::StatusError(500));
        }
        return golden_fetch(request);
    }

    #[test]
    fn server_error_then_next_cycle_runs() {
        let mut out: Vec<u8> = vec![];
        dash(vec![board("Park Street | Red | Inbound", Some(1))], fails_first_time)
            .run(&mut out, Some(2))
            .expect("run");

        let text = String::from_utf8(out).unwrap();
        let cycles: Vec<&str> = text.split("MBTA Live Predictions").skip(1).collect();
        assert_eq!(2, cycles.len());
        assert!(cycles[0].contains("(unavailable: HTTP Status 500)"), "{}", cycles[0]);
        assert!(!cycles[0].contains("Alewife"));
        assert!(cycles[1].contains("Alewife"), "{}", cycles[1]);
        assert_eq!(2, CALLS.load(Ordering::SeqCst));
    }

    #[test]
    fn one_shot_runs_once() {
        let mut out: Vec<u8> = vec![];
        dash(vec![board("Park Street | Red | Inbound", Some(1))], golden_fetch)
            .run(&mut out, Some(1))
            .expect("run");

        let text = String::from_utf8(out).unwrap();
        assert_eq!(1, text.matches("MBTA Live Predictions").count());
        assert!(text.ends_with('\n'));
    }

    static STOP_DURING_FETCH: AtomicBool = AtomicBool::new(false);

    fn interrupted_fetch(request: &mbta::HttpRequest) -> result::FetchResult<String> {
        STOP_DURING_FETCH.store(true, Ordering::SeqCst);
        return golden_fetch(request);
    }

    #[test]
    fn interrupt_during_fetch_prints_nothing() {
        let mut out: Vec<u8> = vec![];
        let dash = MbtaDash::new(
            vec![board("Park Street | Red | Inbound", Some(1))],
            structs::Credential::new("test-key").unwrap(),
            settings(),
            interrupted_fetch,
            &STOP_DURING_FETCH);

        dash.run(&mut out, None).expect("run");
        assert!(out.is_empty(), "{}", String::from_utf8_lossy(&out));
    }

    static STOP_WHILE_SLEEPING: AtomicBool = AtomicBool::new(false);

    #[test]
    fn interrupt_while_sleeping_exits_promptly() {
        let mut slow = settings();
        slow.interval = std::time::Duration::from_secs(60);
        let dash = MbtaDash::new(
            vec![board("Park Street | Red | Inbound", Some(1))],
            structs::Credential::new("test-key").unwrap(),
            slow,
            golden_fetch,
            &STOP_WHILE_SLEEPING);

        let raiser = std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(300));
            STOP_WHILE_SLEEPING.store(true, Ordering::SeqCst);
        });

        let start = std::time::Instant::now();
        let mut out: Vec<u8> = vec![];
        dash.run(&mut out, None).expect("run");
        raiser.join().unwrap();

        assert!(start.elapsed() < std::time::Duration::from_secs(10));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(1, text.matches("MBTA Live Predictions").count());
    }
}
