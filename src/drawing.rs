extern crate chrono;
extern crate chrono_tz;

use chrono::TimeZone;

use crate::structs;

pub const NO_ARRIVALS: &str = "No arrivals";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub fn countdown_summary(now_ts: i64, event_ts: i64) -> String {
    let minutes = structs::minutes_between(now_ts, event_ts);
    if minutes <= 0 {
        return "Arriving".to_string();
    }
    return format!("{} min", minutes);
}

// "2:05 PM"
pub fn local_clock(ts: i64, tz: &chrono_tz::Tz) -> String {
    return match tz.timestamp_opt(ts, 0).single() {
        Some(t) => t.format("%-I:%M %p").to_string(),
        None => "".to_string(),
    };
}

/// One line per prediction, soonest first. Equal waits are ordered by
/// route, then destination.
pub fn format_predictions(predictions: &[structs::Prediction], now_ts: i64, tz: &chrono_tz::Tz) -> Vec<String> {
    if predictions.is_empty() {
        return vec![format!("  {}", NO_ARRIVALS)];
    }

    let mut sorted: Vec<&structs::Prediction> = predictions.iter().collect();
    sorted.sort_by(|a, b| {
        a.minutes_until(now_ts).cmp(&b.minutes_until(now_ts))
            .then_with(|| a.route_id.cmp(&b.route_id))
            .then_with(|| a.destination.cmp(&b.destination))
    });

    return sorted.into_iter().map(|p| {
        let event_ts = p.event_ts().unwrap_or(now_ts);
        format!("  {:<8} {:<22} {:>8}  {}",
                p.route_id,
                p.destination,
                countdown_summary(now_ts, event_ts),
                local_clock(event_ts, tz))
            .trim_end()
            .to_string()
    }).collect();
}

pub fn render_board(board: &structs::Board,
                    predictions: &[structs::Prediction],
                    now_ts: i64,
                    settings: &structs::Settings) -> Vec<String> {
    let mut lines = vec![board.title.clone()];
    lines.extend(format_predictions(predictions, now_ts, &settings.timezone)
                 .into_iter()
                 .take(settings.max_per_board));
    return lines;
}

pub fn render_unavailable(board: &structs::Board, err: &dyn std::fmt::Display) -> Vec<String> {
    return vec![board.title.clone(), format!("  (unavailable: {})", err)];
}

pub fn header(now: &chrono::DateTime<chrono::Utc>, settings: &structs::Settings) -> Vec<String> {
    let local = now.with_timezone(&settings.timezone);
    let rule = "=".repeat(80);
    let first_rule = if settings.clear_screen {
        format!("{}{}", CLEAR_SCREEN, rule)
    } else {
        rule.clone()
    };
    return vec![
        first_rule,
        format!("MBTA Live Predictions @ {}", local.format("%Y-%m-%d %H:%M:%S %Z")),
        rule,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1760796000;

    fn prediction(route_id: &str, destination: &str, arrival_ts: i64) -> structs::Prediction {
        return structs::Prediction {
            route_id: route_id.to_string(),
            destination: destination.to_string(),
            arrival_ts: Some(arrival_ts),
            departure_ts: None,
        };
    }

    fn settings(max_per_board: usize) -> structs::Settings {
        return structs::Settings {
            api_base: "https://example.test".to_string(),
            interval: std::time::Duration::from_secs(30),
            max_per_board: max_per_board,
            timezone: chrono_tz::America::New_York,
            clear_screen: false,
        };
    }

    #[test]
    fn soonest_first() {
        let lines = format_predictions(
            &vec![
                prediction("Red", "Alewife", NOW + 5 * 60),
                prediction("Red", "Braintree", NOW + 2 * 60),
            ],
            NOW,
            &chrono_tz::America::New_York);

        assert_eq!(2, lines.len());
        assert!(lines[0].contains("Braintree"), "{}", lines[0]);
        assert!(lines[0].contains("2 min"), "{}", lines[0]);
        assert!(lines[1].contains("Alewife"), "{}", lines[1]);
        assert!(lines[1].contains("5 min"), "{}", lines[1]);
    }

    #[test]
    fn ties_by_route_then_destination() {
        let lines = format_predictions(
            &vec![
                prediction("Red", "Braintree", NOW + 180),
                prediction("Orange", "Oak Grove", NOW + 170),
                prediction("Red", "Ashmont", NOW + 190),
            ],
            NOW,
            &chrono_tz::America::New_York);

        assert!(lines[0].contains("Oak Grove"));
        assert!(lines[1].contains("Ashmont"));
        assert!(lines[2].contains("Braintree"));
    }

    #[test]
    fn arriving_now_is_not_negative() {
        let lines = format_predictions(
            &vec![
                prediction("Blue", "Wonderland", NOW),
                prediction("Blue", "Bowdoin", NOW - 120),
            ],
            NOW,
            &chrono_tz::America::New_York);

        for line in &lines {
            assert!(line.contains("Arriving"), "{}", line);
            assert!(!line.contains('-'), "{}", line);
        }
    }

    #[test]
    fn formatting_is_idempotent() {
        let predictions = vec![
            prediction("Green-E", "Heath Street", NOW + 400),
            prediction("Green-B", "Boston College", NOW + 400),
            prediction("Green-C", "Cleveland Circle", NOW + 60),
        ];
        let tz = chrono_tz::America::New_York;

        assert_eq!(format_predictions(&predictions, NOW, &tz), format_predictions(&predictions, NOW, &tz));
    }

    #[test]
    fn empty_says_no_arrivals() {
        assert_eq!(vec!["  No arrivals".to_string()], format_predictions(&[], NOW, &chrono_tz::America::New_York));
    }

    #[test]
    fn local_clock_in_eastern_time() {
        // 2025-10-18T14:05:00Z is 10:05 EDT.
        assert_eq!("10:05 AM", local_clock(NOW + 300, &chrono_tz::America::New_York));
    }

    #[test]
    fn board_is_truncated() {
        let board = structs::Board {
            title: "Park Street | Red | Inbound".to_string(),
            filter: structs::StationFilter::new("Park Street", vec!["place-pktrm".to_string()], vec![], Some(1)).unwrap(),
        };
        let predictions: Vec<structs::Prediction> = (0..8)
            .map(|i| prediction("Red", "Alewife", NOW + i * 60))
            .collect();

        let lines = render_board(&board, &predictions, NOW, &settings(5));
        assert_eq!(6, lines.len());
        assert_eq!("Park Street | Red | Inbound", lines[0]);
    }

    #[test]
    fn header_has_local_time() {
        let now = chrono::Utc.timestamp_opt(NOW, 0).unwrap();
        let lines = header(&now, &settings(5));
        assert_eq!("MBTA Live Predictions @ 2025-10-18 10:00:00 EDT", lines[1]);
    }

    #[test]
    fn clear_screen_has_no_blank_line() {
        let now = chrono::Utc.timestamp_opt(NOW, 0).unwrap();
        let mut clearing = settings(5);
        clearing.clear_screen = true;

        let lines = header(&now, &clearing);
        assert_eq!(3, lines.len());
        assert_eq!(format!("{}{}", CLEAR_SCREEN, "=".repeat(80)), lines[0]);
        assert!(!lines.join("\n").contains(&format!("{}\n", CLEAR_SCREEN)));
    }
}
