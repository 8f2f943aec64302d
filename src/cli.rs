//! CLI definition and dispatch.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::audit_adapter::JsonlAuditAdapter;
use crate::adapters::bus_adapter::MemoryBusAdapter;
use crate::adapters::csv_adapter::{self, CsvBrokerAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteStoreAdapter;
use crate::domain::backtest::{self, BacktestResult, ExitConfig};
use crate::domain::attribution::{SignalPerformance, analyze_signals};
use crate::domain::candle::Timeframe;
use crate::domain::config_validation::{
    validate_backtest_config, validate_broker_config, validate_instrument_config,
    validate_session_config,
};
use crate::domain::error::TickforgeError;
use crate::domain::history::{HistoryRequest, resolve_history};
use crate::domain::live::LiveEngine;
use crate::domain::market_hours::{MarketHours, SessionWindow};
use crate::domain::risk::RiskContext;
use crate::domain::rule::{ReferenceLevels, RuleKind, RuleSet};
use crate::domain::signal::SignalEngine;
use crate::domain::sink::SignalSink;
use crate::ports::broker_port::{BrokerCredentials, BrokerPort};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

#[derive(Parser, Debug)]
#[command(name = "tickforge", about = "Tick-to-signal engine and rule backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over cached/remote historical candles
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        timeframe: Option<String>,
        /// Range start, YYYY-MM-DD (overrides --days)
        #[arg(long)]
        from: Option<String>,
        /// Range end, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        /// Trailing period length in days
        #[arg(long)]
        days: Option<i64>,
        /// Stop-loss offset, percent of entry
        #[arg(long)]
        stop: Option<f64>,
        /// Take-profit offset, percent of entry
        #[arg(long)]
        target: Option<f64>,
    },
    /// Analyze recent persisted signals against 1-minute candles
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 0.5)]
        stop: f64,
        #[arg(long, default_value_t = 1.0)]
        target: f64,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Validate credentials and open the broker session
    Connect {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Persist rule weight overrides, e.g. prev_level_break=7,body_dominance=5
    SaveRules {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        weights: String,
    },
    /// Replay a recorded tick file through the live pipeline
    ReplayTicks {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticks: PathBuf,
        /// Previous session high used as the break reference level
        #[arg(long)]
        prev_high: f64,
        /// Previous session low used as the break reference level
        #[arg(long)]
        prev_low: f64,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            timeframe,
            from,
            to,
            days,
            stop,
            target,
        } => run_backtest_command(
            &config,
            timeframe.as_deref(),
            from.as_deref(),
            to.as_deref(),
            days,
            stop,
            target,
        ),
        Command::Analyze {
            config,
            stop,
            target,
            days,
        } => run_analyze(&config, stop, target, days),
        Command::Connect { config } => run_connect(&config),
        Command::SaveRules { config, weights } => run_save_rules(&config, &weights),
        Command::ReplayTicks {
            config,
            ticks,
            prev_high,
            prev_low,
        } => run_replay_ticks(&config, &ticks, prev_high, prev_low),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Resolve the backtest range: explicit dates win over a trailing period.
pub fn resolve_range(
    from: Option<&str>,
    to: Option<&str>,
    days: Option<i64>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), TickforgeError> {
    match (from, to) {
        (Some(from), to) => {
            let start = parse_day_start(from)?;
            let end = match to {
                Some(to) => parse_day_end(to)?,
                None => now,
            };
            if start >= end {
                return Err(TickforgeError::ConfigInvalid {
                    section: "backtest".into(),
                    key: "from".into(),
                    reason: "range start must be before range end".into(),
                });
            }
            Ok((start, end))
        }
        (None, _) => {
            let period = days.unwrap_or(30);
            if period <= 0 {
                return Err(TickforgeError::ConfigInvalid {
                    section: "backtest".into(),
                    key: "days".into(),
                    reason: "days must be positive".into(),
                });
            }
            Ok((now - Duration::days(period), now))
        }
    }
}

fn parse_day_start(raw: &str) -> Result<DateTime<Utc>, TickforgeError> {
    parse_day(raw).map(|d| {
        d.and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .and_utc()
    })
}

fn parse_day_end(raw: &str) -> Result<DateTime<Utc>, TickforgeError> {
    parse_day(raw).map(|d| {
        d.and_hms_opt(23, 59, 59)
            .expect("end of day is a valid time")
            .and_utc()
    })
}

fn parse_day(raw: &str) -> Result<NaiveDate, TickforgeError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| TickforgeError::ConfigInvalid {
        section: "backtest".into(),
        key: "range".into(),
        reason: format!("expected YYYY-MM-DD, got '{raw}': {e}"),
    })
}

/// Parse a weight override list: `rule=weight` pairs separated by commas.
pub fn parse_weight_list(raw: &str) -> Result<Vec<(RuleKind, u32)>, TickforgeError> {
    let mut weights = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, value)) = entry.split_once('=') else {
            return Err(TickforgeError::ConfigInvalid {
                section: "rules".into(),
                key: entry.to_string(),
                reason: "expected rule=weight".into(),
            });
        };
        let kind =
            RuleKind::parse(name.trim()).ok_or_else(|| TickforgeError::ConfigInvalid {
                section: "rules".into(),
                key: name.trim().to_string(),
                reason: "unknown rule name".into(),
            })?;
        let weight = value
            .trim()
            .parse::<u32>()
            .map_err(|e| TickforgeError::ConfigInvalid {
                section: "rules".into(),
                key: name.trim().to_string(),
                reason: format!("invalid weight: {e}"),
            })?;
        weights.push((kind, weight));
    }
    if weights.is_empty() {
        return Err(TickforgeError::ConfigInvalid {
            section: "rules".into(),
            key: "weights".into(),
            reason: "no rule weights given".into(),
        });
    }
    Ok(weights)
}

/// Rule table with any stored weight overrides applied.
pub fn rule_set_from_store(store: &dyn StorePort) -> Result<RuleSet, TickforgeError> {
    let stored = store.load_rule_weights()?;
    if stored.is_empty() {
        return Ok(RuleSet::default());
    }
    let overrides: HashMap<RuleKind, u32> = stored.into_iter().collect();
    Ok(RuleSet::with_weights(&overrides))
}

pub fn build_exit_config(
    config: &dyn ConfigPort,
    stop_override: Option<f64>,
    target_override: Option<f64>,
) -> ExitConfig {
    let defaults = ExitConfig::default();
    ExitConfig {
        stop_pct: stop_override
            .unwrap_or_else(|| config.get_double("backtest", "stop_pct", defaults.stop_pct)),
        target_pct: target_override
            .unwrap_or_else(|| config.get_double("backtest", "target_pct", defaults.target_pct)),
    }
}

pub fn build_session_window(config: &dyn ConfigPort) -> SessionWindow {
    let defaults = SessionWindow::default();
    let parse = |key: &str, fallback: NaiveTime| {
        config
            .get_string("session", key)
            .and_then(|raw| NaiveTime::parse_from_str(&raw, "%H:%M").ok())
            .unwrap_or(fallback)
    };
    SessionWindow {
        opens: parse("opens", defaults.opens),
        closes: parse("closes", defaults.closes),
    }
}

fn instrument_symbol(config: &dyn ConfigPort) -> Result<String, TickforgeError> {
    config
        .get_string("instrument", "symbol")
        .ok_or_else(|| TickforgeError::ConfigMissing {
            section: "instrument".into(),
            key: "symbol".into(),
        })
}

fn build_broker(config: &dyn ConfigPort) -> CsvBrokerAdapter {
    let data_dir = config
        .get_string("broker", "data_dir")
        .unwrap_or_else(|| "./data".to_string());
    CsvBrokerAdapter::new(PathBuf::from(data_dir))
}

fn broker_credentials(config: &dyn ConfigPort) -> Result<BrokerCredentials, TickforgeError> {
    validate_broker_config(config)?;
    Ok(BrokerCredentials {
        api_key: config
            .get_string("broker", "api_key")
            .unwrap_or_default(),
        access_token: config
            .get_string("broker", "access_token")
            .unwrap_or_default(),
    })
}

fn resolve_timeframe(
    config: &dyn ConfigPort,
    arg: Option<&str>,
) -> Result<Timeframe, TickforgeError> {
    let label = match arg {
        Some(label) => label.to_string(),
        None => config
            .get_string("backtest", "timeframe")
            .unwrap_or_else(|| "5m".to_string()),
    };
    Timeframe::parse(&label).ok_or_else(|| TickforgeError::ConfigInvalid {
        section: "backtest".into(),
        key: "timeframe".into(),
        reason: format!("unknown timeframe '{label}' (expected 1m, 3m, 5m or 15m)"),
    })
}

fn fail(e: &TickforgeError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

#[allow(clippy::too_many_arguments)]
fn run_backtest_command(
    config_path: &PathBuf,
    timeframe_arg: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    days: Option<i64>,
    stop: Option<f64>,
    target: Option<f64>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_instrument_config(&config).and_then(|_| validate_backtest_config(&config)) {
        return fail(&e);
    }

    let symbol = match instrument_symbol(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let timeframe = match resolve_timeframe(&config, timeframe_arg) {
        Ok(tf) => tf,
        Err(e) => return fail(&e),
    };
    let (range_from, range_to) = match resolve_range(from, to, days, Utc::now()) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let exits = build_exit_config(&config, stop, target);

    let store = match SqliteStoreAdapter::from_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let broker = build_broker(&config);

    let rules = match rule_set_from_store(&store) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Resolving {symbol} {timeframe} candles {} .. {}",
        range_from.format("%Y-%m-%d"),
        range_to.format("%Y-%m-%d")
    );
    let request = HistoryRequest {
        instrument: symbol.clone(),
        timeframe,
        from: range_from,
        to: range_to,
    };
    let resolved = match resolve_history(&broker, &store, &request) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!("Replaying {} candles", resolved.candles.len());
    let result = backtest::run_backtest(&resolved.candles, &symbol, timeframe, rules, &exits);

    print_backtest_report(&result, &resolved.data_source_message, &symbol, timeframe);
    ExitCode::SUCCESS
}

fn print_backtest_report(
    result: &BacktestResult,
    data_source_message: &str,
    symbol: &str,
    timeframe: Timeframe,
) {
    let m = &result.metrics;
    println!("Backtest: {symbol} {timeframe}");
    println!("Data: {data_source_message}");
    println!(
        "Signals: {}  Trades: {}",
        result.signals.len(),
        result.trades.len()
    );
    println!(
        "Win rate: {:.1}% ({}W/{}L)",
        m.win_rate(),
        m.wins,
        m.losses
    );
    match m.profit_factor() {
        Some(pf) => println!("Profit factor: {pf:.2}"),
        None => println!("Profit factor: n/a (no losing trades)"),
    }
    println!("Max drawdown: {:.2}%", m.max_drawdown * 100.0);
    println!("Final equity: {:.2}", m.equity);
}

fn run_analyze(config_path: &PathBuf, stop: f64, target: f64, days: i64) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_instrument_config(&config) {
        return fail(&e);
    }
    let symbol = match instrument_symbol(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let store = match SqliteStoreAdapter::from_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let now = Utc::now();
    let since = now - Duration::days(days.max(1));
    let signals = match store.signals_since(since) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    if signals.is_empty() {
        println!("No persisted signals in the last {days} days.");
        return ExitCode::SUCCESS;
    }

    let window_from = signals[0].time;
    let window = match store.candles_in_range(&symbol, Timeframe::M1, window_from, now) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if window.is_empty() {
        let e = TickforgeError::DataUnavailable {
            instrument: symbol,
            timeframe: Timeframe::M1.label().to_string(),
        };
        return fail(&e);
    }

    let exits = ExitConfig {
        stop_pct: stop,
        target_pct: target,
    };
    let report = analyze_signals(&signals, &window, &exits);
    print_analysis_report(&report, stop, target);
    ExitCode::SUCCESS
}

fn print_analysis_report(report: &SignalPerformance, stop: f64, target: f64) {
    println!(
        "Signal performance (stop {stop}%, target {target}%): {} signals, {}W/{}L, win rate {:.1}%",
        report.total_signals,
        report.wins,
        report.losses,
        report.win_rate()
    );
    for rule in &report.rule_performance {
        println!(
            "  {:<20} {} trades  {}W/{}L  {:.1}%",
            rule.rule.name(),
            rule.trades(),
            rule.wins,
            rule.losses,
            rule.win_rate()
        );
    }
}

fn run_connect(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // credential presence is checked before any broker call
    let credentials = match broker_credentials(&config) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let mut broker = build_broker(&config);
    match broker.connect(&credentials) {
        Ok(()) => {
            println!("Connected to broker.");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_save_rules(config_path: &PathBuf, weights: &str) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let parsed = match parse_weight_list(weights) {
        Ok(w) => w,
        Err(e) => return fail(&e),
    };

    let store = match SqliteStoreAdapter::from_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Err(e) = store.save_rule_weights(&parsed) {
        return fail(&e);
    }

    println!("Saved {} rule weights.", parsed.len());
    ExitCode::SUCCESS
}

fn run_replay_ticks(
    config_path: &PathBuf,
    ticks_path: &PathBuf,
    prev_high: f64,
    prev_low: f64,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_instrument_config(&config).and_then(|_| validate_session_config(&config)) {
        return fail(&e);
    }
    let symbol = match instrument_symbol(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let store = match SqliteStoreAdapter::from_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let audit_path = config
        .get_string("audit", "path")
        .unwrap_or_else(|| "signals.audit.jsonl".to_string());
    let mut audit = match JsonlAuditAdapter::open(&audit_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    let bus = MemoryBusAdapter::new();

    let rules = match rule_set_from_store(&store) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let signal_engine = SignalEngine::new(symbol.clone(), rules)
        .suppress_in_safe_mode(config.get_bool("engine", "suppress_in_safe_mode", false));

    eprintln!("Reading ticks from {}", ticks_path.display());
    let ticks = match csv_adapter::read_ticks(ticks_path) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let mut engine = LiveEngine::new(
        &Timeframe::ALL,
        signal_engine,
        MarketHours::new(build_session_window(&config)),
        ReferenceLevels {
            prev_high,
            prev_low,
        },
        RiskContext::new(),
        sink,
        &bus,
    );

    for tick in &ticks {
        engine.on_timer(tick.timestamp);
        engine.on_tick(tick);
    }

    println!(
        "Replayed {} ticks: {} signals emitted, audit log {}",
        ticks.len(),
        engine.signals_emitted(),
        audit_path
    );
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn resolve_range_explicit_dates() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let (from, to) =
            resolve_range(Some("2024-06-01"), Some("2024-06-05"), None, now).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2024, 6, 5, 23, 59, 59).unwrap());
    }

    #[test]
    fn resolve_range_trailing_days() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let (from, to) = resolve_range(None, None, Some(7), now).unwrap();
        assert_eq!(to, now);
        assert_eq!(from, now - Duration::days(7));
    }

    #[test]
    fn resolve_range_rejects_inverted() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let result = resolve_range(Some("2024-06-05"), Some("2024-06-01"), None, now);
        assert!(matches!(result, Err(TickforgeError::ConfigInvalid { .. })));
    }

    #[test]
    fn resolve_range_rejects_bad_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let result = resolve_range(Some("June 1st"), None, None, now);
        assert!(matches!(result, Err(TickforgeError::ConfigInvalid { .. })));
    }

    #[test]
    fn parse_weight_list_valid() {
        let weights = parse_weight_list("prev_level_break=7, body_dominance=3").unwrap();
        assert_eq!(
            weights,
            vec![(RuleKind::PrevLevelBreak, 7), (RuleKind::BodyDominance, 3)]
        );
    }

    #[test]
    fn parse_weight_list_unknown_rule() {
        assert!(matches!(
            parse_weight_list("momentum=5"),
            Err(TickforgeError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn parse_weight_list_bad_weight() {
        assert!(matches!(
            parse_weight_list("prev_level_break=heavy"),
            Err(TickforgeError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn parse_weight_list_empty() {
        assert!(matches!(
            parse_weight_list(" , "),
            Err(TickforgeError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn build_exit_config_precedence() {
        let config =
            FileConfigAdapter::from_string("[backtest]\nstop_pct = 0.4\ntarget_pct = 0.9\n")
                .unwrap();
        // config values win over defaults
        let from_config = build_exit_config(&config, None, None);
        assert!((from_config.stop_pct - 0.4).abs() < f64::EPSILON);
        assert!((from_config.target_pct - 0.9).abs() < f64::EPSILON);

        // explicit arguments win over config
        let overridden = build_exit_config(&config, Some(0.25), None);
        assert!((overridden.stop_pct - 0.25).abs() < f64::EPSILON);
        assert!((overridden.target_pct - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn build_session_window_falls_back_to_defaults() {
        let config = FileConfigAdapter::from_string("[session]\nopens = 10:00\n").unwrap();
        let window = build_session_window(&config);
        assert_eq!(window.opens, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(
            window.closes,
            SessionWindow::default().closes
        );
    }
}
