//! CLI orchestration integration tests.
//!
//! Tests cover:
//! - config loading and validation with real INI files on disk
//! - stored rule weights flowing into the rule table
//! - the CSV broker adapter feeding the historical cache end to end
//! - credential validation before any broker call

use chrono::{Duration, TimeZone, Utc};
use std::io::Write;
use tickforge::adapters::csv_adapter::CsvBrokerAdapter;
use tickforge::adapters::file_config_adapter::FileConfigAdapter;
use tickforge::adapters::sqlite_adapter::SqliteStoreAdapter;
use tickforge::cli;
use tickforge::domain::backtest::{ExitConfig, run_backtest};
use tickforge::domain::candle::Timeframe;
use tickforge::domain::config_validation::{validate_broker_config, validate_instrument_config};
use tickforge::domain::error::TickforgeError;
use tickforge::domain::history::{HistoryRequest, resolve_history};
use tickforge::domain::rule::{DEFAULT_RULE_WEIGHT, RuleKind};
use tickforge::ports::store_port::StorePort;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[instrument]
symbol = BANKNIFTY

[broker]
api_key = demo-key
access_token = demo-token
data_dir = ./data

[sqlite]
path = tickforge.db

[backtest]
timeframe = 5m
stop_pct = 0.5
target_pct = 1.0

[session]
opens = 09:15
closes = 15:30
"#;

mod config_loading {
    use super::*;

    #[test]
    fn valid_ini_loads_and_validates() {
        let file = write_temp_ini(VALID_INI);
        let config = FileConfigAdapter::from_file(file.path()).unwrap();

        assert!(validate_instrument_config(&config).is_ok());
        assert!(validate_broker_config(&config).is_ok());

        let exits = cli::build_exit_config(&config, None, None);
        assert!((exits.stop_pct - 0.5).abs() < f64::EPSILON);
        assert!((exits.target_pct - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_credentials_rejected_before_any_call() {
        let file = write_temp_ini("[instrument]\nsymbol = BANKNIFTY\n[broker]\napi_key = k\n");
        let config = FileConfigAdapter::from_file(file.path()).unwrap();

        match validate_broker_config(&config) {
            Err(TickforgeError::ConfigMissing { section, key }) => {
                assert_eq!(section, "broker");
                assert_eq!(key, "access_token");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }
}

mod rule_configuration {
    use super::*;

    #[test]
    fn saved_weights_flow_into_rule_table() {
        let store = SqliteStoreAdapter::in_memory().unwrap();
        let weights = cli::parse_weight_list("prev_level_break=8,body_dominance=2").unwrap();
        store.save_rule_weights(&weights).unwrap();

        let rules = cli::rule_set_from_store(&store).unwrap();
        assert_eq!(rules.weight(RuleKind::PrevLevelBreak), 8);
        assert_eq!(rules.weight(RuleKind::BodyDominance), 2);
    }

    #[test]
    fn empty_store_yields_default_table() {
        let store = SqliteStoreAdapter::in_memory().unwrap();
        let rules = cli::rule_set_from_store(&store).unwrap();
        assert_eq!(rules.weight(RuleKind::PrevLevelBreak), DEFAULT_RULE_WEIGHT);
        assert_eq!(rules.weight(RuleKind::BodyDominance), DEFAULT_RULE_WEIGHT);
    }
}

mod csv_to_backtest {
    use super::*;

    #[test]
    fn csv_broker_feeds_cache_and_backtest() {
        let data_dir = tempfile::tempdir().unwrap();
        let mut csv = std::fs::File::create(data_dir.path().join("BANKNIFTY_5m.csv")).unwrap();
        writeln!(csv, "timestamp,open,high,low,close").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        for i in 0..20 {
            let t = start + Duration::minutes(5 * i);
            let base = 48_000.0 + (i as f64) * 40.0;
            writeln!(
                csv,
                "{},{},{},{},{}",
                t.to_rfc3339(),
                base,
                base + 120.0,
                base - 15.0,
                base + 100.0
            )
            .unwrap();
        }
        drop(csv);

        let broker = CsvBrokerAdapter::new(data_dir.path().to_path_buf());
        let store = SqliteStoreAdapter::in_memory().unwrap();

        let request = HistoryRequest {
            instrument: "BANKNIFTY".into(),
            timeframe: Timeframe::M5,
            from: start - Duration::hours(1),
            to: start + Duration::hours(4),
        };
        let resolved = resolve_history(&broker, &store, &request).unwrap();
        assert_eq!(resolved.candles.len(), 20);
        assert!(resolved.data_source_message.contains("merged"));

        let result = run_backtest(
            &resolved.candles,
            "BANKNIFTY",
            Timeframe::M5,
            cli::rule_set_from_store(&store).unwrap(),
            &ExitConfig::default(),
        );
        assert!(!result.signals.is_empty());
        assert_eq!(result.trades.len(), result.signals.len());
    }
}
