pub mod core;
pub mod errors;
pub mod fetch;
pub mod interfaces;
pub mod post;
pub mod pre;


#[cfg(test)]
mod status_tests {
    use crate::core::status::{classify, classify_delta, RaceStatus};
    use crate::test_races::t0;
    use chrono::Duration;

    #[test]
    fn test_classify_delta_partition() {
        assert_eq!(classify_delta(i64::MIN), RaceStatus::Expired);
        assert_eq!(classify_delta(-60_001), RaceStatus::Expired);
        assert_eq!(classify_delta(-60_000), RaceStatus::Started);
        assert_eq!(classify_delta(-1), RaceStatus::Started);
        assert_eq!(classify_delta(0), RaceStatus::Critical);
        assert_eq!(classify_delta(59_999), RaceStatus::Critical);
        assert_eq!(classify_delta(60_000), RaceStatus::StartingSoon);
        assert_eq!(classify_delta(299_999), RaceStatus::StartingSoon);
        assert_eq!(classify_delta(300_000), RaceStatus::Upcoming);
        assert_eq!(classify_delta(i64::MAX), RaceStatus::Upcoming);
    }
    #[test]
    fn test_classify_moves_into_starting_soon() {
        let start = t0() + Duration::seconds(325);
        assert_eq!(classify(start, t0()), RaceStatus::Upcoming);
        assert_eq!(classify(start, t0() + Duration::seconds(30)), RaceStatus::StartingSoon);
    }
    #[test]
    fn test_classify_after_start() {
        assert_eq!(classify(t0() - Duration::seconds(30), t0()), RaceStatus::Started);
        assert_eq!(classify(t0() - Duration::seconds(65), t0()), RaceStatus::Expired);
    }
    #[test]
    fn test_status_strings() {
        assert_eq!(RaceStatus::StartingSoon.as_str(), "starting-soon");
        assert_eq!(RaceStatus::Critical.to_string(), "critical");
    }
}



#[cfg(test)]
mod countdown_tests {
    use crate::core::countdown::{CountdownEngine, CountdownState, DisplayFormat};
    use crate::core::scheduler::{Scheduler, TimerId};
    use crate::test_races::{race, t0};
    use std::time::Duration;
    use tokio::time::Instant;

    const REMOVE_MS: i64 = 60_000;

    fn state(delta_ms: i64) -> CountdownState {
        CountdownState::from_delta(delta_ms, REMOVE_MS)
    }

    #[test]
    fn test_decomposition() {
        let x = state(((24 * 3600 + 2 * 3600 + 30 * 60 + 45) * 1000) as i64);
        assert_eq!((x.days, x.hours, x.minutes, x.seconds), (1, 2, 30, 45));
        assert!(!x.is_expired && !x.starting_soon && !x.critical);
        assert_eq!(x.full_display(), "1d 2h 30m");
    }
    #[test]
    fn test_full_display() {
        assert_eq!(state(45_000).full_display(), "45s");
        assert_eq!(state(250_000).full_display(), "4m 10s");
        assert_eq!(state(7_503_000).full_display(), "2h 5m 3s");
        assert_eq!(state(0).full_display(), "+0s");
        assert_eq!(state(-30_000).full_display(), "+30s");
        assert_eq!(state(-65_000).full_display(), "+1m 5s");
    }
    #[test]
    fn test_compact_display() {
        assert_eq!(state(18_187_000).compact_display(), "5:03:07");
        assert_eq!(state(245_000).compact_display(), "04:05");
        assert_eq!(state(2 * 86_400_000).compact_display(), "48:00:00");
        assert_eq!(state(-65_000).compact_display(), "+01:05");
    }
    #[test]
    fn test_minimal_display() {
        assert_eq!(state(45_000).minimal_display(), "45s");
        assert_eq!(state(250_000).minimal_display(), "4m");
        assert_eq!(state(3_900_000).minimal_display(), "65m");
        assert_eq!(state(-1_000).display(DisplayFormat::Minimal), "Started");
    }
    #[test]
    fn test_flags() {
        let x = state(300_000);
        assert!(x.starting_soon && !x.critical);
        let x = state(300_001);
        assert!(!x.starting_soon);
        let x = state(60_000);
        assert!(x.starting_soon && x.critical);

        let x = state(0);
        assert!(x.is_expired && !x.should_remove);
        assert!(!state(-60_000).should_remove);
        assert!(state(-60_001).should_remove);
        assert!(state(-65_000).should_remove);
        assert!(!CountdownState::from_delta(-65_000, 120_000).should_remove);
    }
    #[test]
    fn test_engine_one_timer_per_race() {
        let now_instant = Instant::now();
        let mut scheduler = Scheduler::new();
        let mut x = CountdownEngine::new(Duration::from_secs(1), Duration::from_secs(60));
        let races = vec![race("a", 100), race("b", 200)];

        assert_eq!(x.sync(races.iter(), &mut scheduler, t0(), now_instant), (2, 0));
        assert_eq!(x.sync(races.iter(), &mut scheduler, t0(), now_instant), (0, 0));
        assert_eq!(scheduler.len(), 2);
        assert!(scheduler.is_registered(&TimerId::Countdown("a".to_owned())));

        // b is no longer held
        assert_eq!(x.sync(races[..1].iter(), &mut scheduler, t0(), now_instant), (0, 1));
        assert!(!x.is_tracking("b"));
        assert!(!scheduler.is_registered(&TimerId::Countdown("b".to_owned())));
        assert_eq!(scheduler.len(), 1);
    }
    #[test]
    fn test_engine_tick_and_teardown() {
        let now_instant = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.register(TimerId::Refresh, Duration::from_secs(30), now_instant);
        let mut x = CountdownEngine::new(Duration::from_secs(1), Duration::from_secs(60));
        let races = vec![race("a", 5), race("b", 200)];
        x.sync(races.iter(), &mut scheduler, t0(), now_instant);

        assert_eq!(x.state("a").map(|s| s.seconds), Some(5));
        let ticked = x.tick("a", t0() + chrono::Duration::seconds(66)).unwrap();
        assert!(ticked.is_expired && ticked.should_remove);
        assert!(x.tick("ghost", t0()).is_none());

        x.teardown(&mut scheduler);
        assert!(x.is_empty());
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.is_registered(&TimerId::Refresh));
    }
}



#[cfg(test)]
mod validate_tests {
    use crate::errors::FeedError;
    use crate::fetch::validate::{validate_response, Rejection};
    use crate::test_races::T0_SECS;
    use serde_json::{json, Value};

    fn summary(race_id: &str, category_id: Option<&str>, seconds: Value) -> Value {
        let mut x = json!({
            "race_id": race_id,
            "race_name": "Maiden Plate",
            "race_number": 3,
            "meeting_id": "m1",
            "meeting_name": "Randwick",
            "advertised_start": {"seconds": seconds},
            "venue_state": "NSW"
        });
        if let Some(category_id) = category_id {
            x["category_id"] = json!(category_id);
        }
        x
    }

    fn body(summaries: Vec<Value>, listed: Vec<&str>) -> String {
        let mut race_summaries = serde_json::Map::new();
        for s in summaries {
            race_summaries.insert(s["race_id"].as_str().unwrap().to_owned(), s);
        }
        json!({
            "status": 200,
            "data": {"next_to_go_ids": listed, "race_summaries": race_summaries},
            "message": "Next 3 races from each category"
        })
        .to_string()
    }

    #[test]
    fn test_invalid_race_is_dropped() {
        let x = validate_response(&body(
            vec![
                summary("a", Some("c1"), json!(T0_SECS + 60)),
                summary("b", None, json!(T0_SECS + 120)),
                summary("c", Some("c1"), json!(T0_SECS + 180)),
            ],
            vec!["a", "b", "c"],
        ))
        .unwrap();

        assert_eq!(x.races.len(), 2);
        assert_eq!(x.rejected.len(), 1);
        assert_eq!(x.rejected[0].listed_id, "b");
        assert_eq!(x.rejected[0].reason, Rejection::MissingCategoryId);
        assert!(x.has_warnings());
    }
    #[test]
    fn test_listed_id_without_summary() {
        let x = validate_response(&body(
            vec![summary("a", Some("c1"), json!(T0_SECS))],
            vec!["a", "ghost"],
        ))
        .unwrap();

        assert_eq!(x.races.len(), 1);
        assert_eq!(x.missing_ids, vec!["ghost"]);
        assert_eq!(x.batch_size, 2);
    }
    #[test]
    fn test_loose_numbers() {
        let mut s = summary("a", Some("c1"), json!((T0_SECS + 600).to_string()));
        s["race_number"] = json!("7");
        s["race_form"] = json!("not an object");
        let x = validate_response(&body(vec![s], vec!["a"])).unwrap();

        assert_eq!(x.races[0].race_number, Some(7));
        assert_eq!(x.races[0].advertised_start.timestamp(), T0_SECS + 600);
        assert_eq!(x.races[0].venue.state, "NSW");
    }
    #[test]
    fn test_invalid_start() {
        let x = validate_response(&body(
            vec![
                summary("a", Some("c1"), json!(0)),
                summary("b", Some("c1"), json!("soon")),
                summary("c", Some("c1"), json!(T0_SECS)),
            ],
            vec!["a", "b", "c"],
        ))
        .unwrap();

        assert_eq!(x.races.len(), 1);
        assert!(x
            .rejected
            .iter()
            .all(|r| matches!(r.reason, Rejection::InvalidAdvertisedStart(_))));
    }
    #[test]
    fn test_data_without_envelope() {
        let raw = json!({
            "next_to_go_ids": ["a"],
            "race_summaries": {"a": summary("a", Some("c1"), json!(T0_SECS))}
        });
        assert_eq!(validate_response(&raw.to_string()).unwrap().races.len(), 1);
    }
    #[test]
    fn test_malformed_responses() {
        for raw in [
            "not json",
            "[1, 2]",
            r#"{"status": 200}"#,
            r#"{"data": []}"#,
            r#"{"data": {"race_summaries": {}}}"#,
            r#"{"data": {"next_to_go_ids": []}}"#,
        ] {
            assert!(
                matches!(validate_response(raw), Err(FeedError::MalformedResponse(_))),
                "{} should be malformed",
                raw
            );
        }
    }
    #[test]
    fn test_no_valid_data() {
        let x = validate_response(&body(
            vec![summary("a", None, json!(T0_SECS)), summary("b", None, json!(T0_SECS))],
            vec!["a", "b"],
        ));
        assert_eq!(
            x.unwrap_err(),
            FeedError::NoValidData {
                batch_size: 2,
                rejected: 2
            }
        );
        assert!(matches!(
            validate_response(&body(vec![], vec![])),
            Err(FeedError::NoValidData { .. })
        ));
    }
}

#[cfg(test)]
mod client_tests {
    use crate::errors::FeedError;
    use crate::fetch::client::RaceClient;
    use crate::fetch::source::RaceSource;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    const BODY: &str = r#"{"data": {"next_to_go_ids": ["a"], "race_summaries": {"a": {
        "race_id": "a", "meeting_name": "Ascot", "category_id": "c1",
        "advertised_start": {"seconds": 1700000000}}}}}"#;

    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<String, FeedError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String, FeedError>>) -> ScriptedSource {
            ScriptedSource {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RaceSource for ScriptedSource {
        async fn fetch_body(&self, _count: u32) -> Result<String, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Network("script exhausted".to_owned())))
        }
    }

    fn network(msg: &str) -> Result<String, FeedError> {
        Err(FeedError::Network(msg.to_owned()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_last_error() {
        let x = RaceClient::new(ScriptedSource::new(vec![
            network("first"),
            network("second"),
            network("third"),
        ]));
        let t_start = Instant::now();

        let result = x.retry_fetch(10, 3, Duration::from_millis(1000)).await;

        assert_eq!(result.unwrap_err(), FeedError::Network("third".to_owned()));
        assert_eq!(x.source().calls.load(Ordering::SeqCst), 3);

        // 1000 ms before attempt 2, 2000 ms before attempt 3, nothing after the last one
        let elapsed = t_start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }
    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let x = RaceClient::new(ScriptedSource::new(vec![
            network("down"),
            Ok("{}".to_owned()),
            Ok(BODY.to_owned()),
        ]));

        let batch = x.retry_fetch(10, 5, Duration::from_millis(100)).await.unwrap();

        assert_eq!(batch.races[0].race_id, "a");
        assert_eq!(x.source().calls.load(Ordering::SeqCst), 3);
    }
    #[tokio::test(start_paused = true)]
    async fn test_retry_attempts_at_least_once() {
        let x = RaceClient::new(ScriptedSource::new(vec![network("down"), Ok(BODY.to_owned())]));

        assert!(x.retry_fetch(10, 0, Duration::from_millis(100)).await.is_err());
        assert_eq!(x.source().calls.load(Ordering::SeqCst), 1);
    }
    #[tokio::test]
    async fn test_fetch_surfaces_malformed_response() {
        let x = RaceClient::new(ScriptedSource::new(vec![Ok(r#"{"data": {}}"#.to_owned())]));

        assert!(matches!(
            x.fetch(10).await,
            Err(FeedError::MalformedResponse(_))
        ));
    }
}


#[cfg(test)]
mod board_tests {
    use crate::core::filter::FilterState;
    use crate::core::race::Category;
    use crate::core::repository::{BoardPars, RaceRepository};
    use crate::interfaces::board_interface::BoardState;
    use crate::post::board_print::format_board;
    use crate::test_races::{race, race_in, t0};
    use std::time::Duration;

    #[test]
    fn test_board_from_repository() {
        let mut repository = RaceRepository::new(&BoardPars::default(), Duration::ZERO, None);
        repository.merge_fetch(vec![race("late", 400), race("soon", 45), race("gone", -30)]);
        repository.set_filter(Some(FilterState::default()));

        let x = BoardState::from_repository(&repository, None, Duration::from_secs(60), t0());

        // started races are hidden by the default filter
        let cards: Vec<&str> = x.cards.iter().map(|c| c.race_id.as_str()).collect();
        assert_eq!(cards, vec!["soon", "late"]);
        assert_eq!(x.cards[0].full_display, "45s");
        assert!(x.cards[0].countdown.critical);
        assert_eq!(x.held_races, 3);
        assert_eq!(x.pagination.unwrap().total_items, 2);

        let printed = format_board(&x);
        assert_eq!(printed.lines().count(), 3);
        assert!(printed.contains("2 shown, 3 held, 0 expiring"));
        assert!(printed.contains("[critical]"));
    }
    #[test]
    fn test_board_filters_before_paginating() {
        let mut repository = RaceRepository::new(&BoardPars::default(), Duration::ZERO, None);
        let mut races: Vec<_> = (0..5).map(|i| race(&format!("h{}", i), 400)).collect();
        races.push(race_in("dog", 900, Category::Greyhound));
        repository.merge_fetch(races);

        let mut filter = FilterState::default();
        filter.select_category(Category::Greyhound.id());
        repository.set_filter(Some(filter));

        // the greyhound race sorts onto the second page of the unfiltered set
        let x = BoardState::from_repository(&repository, None, Duration::from_secs(60), t0());
        let pagination = x.pagination.unwrap();

        assert_eq!(x.cards.len(), 1);
        assert_eq!(x.cards[0].race_id, "dog");
        assert_eq!(pagination.total_items, 1);
        assert_eq!(pagination.total_pages, 1);
        assert_eq!(x.held_races, 6);
    }
    #[test]
    fn test_filter_change_resets_page() {
        let mut repository = RaceRepository::new(&BoardPars::default(), Duration::ZERO, None);
        let mut races: Vec<_> = (0..6).map(|i| race(&format!("h{}", i), 400 + i)).collect();
        races.push(race_in("dog", 900, Category::Greyhound));
        repository.merge_fetch(races);
        repository.go_to_page(2, t0()).unwrap();

        let mut filter = FilterState::default();
        filter.select_category(Category::Greyhound.id());
        repository.set_filter(Some(filter));

        assert_eq!(repository.pagination(t0()).current_page, 1);
        assert!(repository.go_to_page(2, t0()).is_err());
        assert!(repository.page(2, 5, t0()).is_err());
        assert!(!repository.next_page(t0()));

        repository.set_filter(None);
        assert_eq!(repository.pagination(t0()).total_pages, 2);
        assert!(repository.next_page(t0()));
    }
}

#[cfg(test)]
mod check_feed_opts_pars_tests {
    use crate::pre::check_feed_opts_pars::check_feed_opts_pars;
    use crate::pre::feed_opts::FeedOpts;
    use crate::pre::read_feed_pars::{read_feed_pars, FeedPars};
    use clap::Parser;
    use std::path::Path;

    fn opts(args: &[&str]) -> FeedOpts {
        FeedOpts::parse_from(std::iter::once("racefeed").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(check_feed_opts_pars(&opts(&[]), &FeedPars::default()).is_ok());
    }
    #[test]
    fn test_parameter_file() {
        let filepath = Path::new(env!("CARGO_MANIFEST_DIR")).join("../input/feed_pars.json");
        let x = read_feed_pars(&filepath).unwrap();

        assert!(check_feed_opts_pars(&opts(&[]), &x).is_ok());
        assert_eq!(x.board_pars.page_size, 5);
    }
    #[test]
    fn test_overrides() {
        let feed_opts = opts(&["-c", "20", "-s", "8", "-r", "15"]);
        let mut x = FeedPars::default();
        x.apply_opts(&feed_opts);

        assert_eq!(x.board_pars.fetch_count, 20);
        assert_eq!(x.board_pars.page_size, 8);
        assert_eq!(x.timing_pars.refresh_interval_ms, 15_000);
    }
    #[test]
    fn test_invalid_options() {
        let pars = FeedPars::default();
        assert!(check_feed_opts_pars(&opts(&["--page", "0"]), &pars).is_err());
        assert!(check_feed_opts_pars(&opts(&["--category", "camel"]), &pars).is_err());
        assert!(check_feed_opts_pars(&opts(&["--category", "Horse"]), &pars).is_ok());
        assert!(check_feed_opts_pars(&opts(&["--use-proxy"]), &pars).is_err());
    }
    #[test]
    fn test_invalid_parameters() {
        let feed_opts = opts(&[]);

        let mut x = FeedPars::default();
        x.board_pars.fetch_count = 0;
        assert!(check_feed_opts_pars(&feed_opts, &x).is_err());

        let mut x = FeedPars::default();
        x.timing_pars.frequent_expiration_check_ms = x.timing_pars.expiration_check_interval_ms;
        assert!(check_feed_opts_pars(&feed_opts, &x).is_err());

        let mut x = FeedPars::default();
        x.api_pars.base_url = "ftp://example.com/races".to_owned();
        assert!(check_feed_opts_pars(&feed_opts, &x).is_err());

        let mut x = FeedPars::default();
        x.api_pars.proxy_url = Some("not a url".to_owned());
        assert!(check_feed_opts_pars(&feed_opts, &x).is_err());
    }
    #[test]
    fn test_remove_threshold_below_expire_threshold() {
        let feed_opts = opts(&[]);

        let mut x = FeedPars::default();
        x.timing_pars.remove_threshold_s = 59;
        assert!(check_feed_opts_pars(&feed_opts, &x).is_err());

        x.timing_pars.remove_threshold_s = 90;
        assert!(check_feed_opts_pars(&feed_opts, &x).is_ok());
    }
}
