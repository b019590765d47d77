//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::BacktestConfig;
use crate::domain::config_validation::{
    parse_list, read_exit_check, read_number, read_signal_priority, validate_backtest_config,
    validate_strategy_config, RULE_SECTIONS,
};
use crate::domain::error::ImatradeError;
use crate::domain::financial::{ExitLevel, SizingPolicy};
use crate::domain::indicator::IndicatorSpec;
use crate::domain::metrics::Metrics;
use crate::domain::position::Direction;
use crate::domain::processor::{MarketDataProcessor, SimulationResult};
use crate::domain::rule::{Phase, RuleSet};
use crate::domain::rule_parser::parse_rule;
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::BarSource;
use crate::ports::report_port::ReportSink;

#[derive(Parser, Debug)]
#[command(name = "imatrade", about = "Bar-by-bar trading strategy simulator")]
pub struct Cli {
    /// Log at debug level (per-bar signals and indicator warm-up)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation over CSV bar data
    Backtest {
        #[arg(short, long)]
        strategy: PathBuf,
        /// Directory holding one `<instrument>.csv` per instrument
        #[arg(short, long)]
        data: PathBuf,
        /// Directory for processed-bar and ledger CSVs
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Simulate this instrument instead of the configured list
        #[arg(long)]
        instrument: Option<String>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// List instruments with bar data in a directory
    List {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            strategy,
            data,
            output,
            instrument,
        } => run_backtest(&strategy, &data, output.as_deref(), instrument.as_deref()),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::List { data } => run_list(&data),
    }
}

/// Default `info`, `debug` with `--verbose`; `RUST_LOG` wins when set.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ImatradeError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Print an error, with a caret under the failing column for rule parse errors.
fn report_error(err: &ImatradeError, config: &dyn ConfigPort) -> ExitCode {
    match err {
        ImatradeError::RuleParse { condition, source } => {
            let expression = RULE_SECTIONS
                .iter()
                .flat_map(|(entry, exit)| [*entry, *exit])
                .find_map(|section| config.get_string(section, condition));
            match expression {
                Some(expression) => eprintln!(
                    "error: failed to parse condition '{condition}':\n{}",
                    source.display_with_context(&expression)
                ),
                None => eprintln!("error: {err}"),
            }
        }
        _ => eprintln!("error: {err}"),
    }
    err.into()
}

/// Load, validate and build both halves of a strategy file.
fn prepare(path: &Path) -> Result<(Strategy, BacktestConfig), ExitCode> {
    eprintln!("Loading strategy from {}", path.display());
    let adapter = load_config(path)?;

    validate_strategy_config(&adapter).map_err(|e| report_error(&e, &adapter))?;
    validate_backtest_config(&adapter).map_err(|e| report_error(&e, &adapter))?;

    let strategy = build_strategy(&adapter).map_err(|e| report_error(&e, &adapter))?;
    let bt_config = build_backtest_config(&adapter).map_err(|e| report_error(&e, &adapter))?;
    Ok((strategy, bt_config))
}

fn run_backtest(
    strategy_path: &Path,
    data_dir: &Path,
    output_dir: Option<&Path>,
    instrument_override: Option<&str>,
) -> ExitCode {
    // Stage 1: load and build
    let (strategy, bt_config) = match prepare(strategy_path) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };
    eprintln!("Loaded strategy: {}", strategy.name);

    // Stage 2: resolve instruments
    let instruments = resolve_instruments(instrument_override, &strategy);
    if instruments.is_empty() {
        let err = ImatradeError::ConfigMissing {
            section: "strategy".into(),
            key: "instruments".into(),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }

    // Stage 3: one isolated simulation per instrument
    let source = CsvAdapter::new(data_dir.to_path_buf());
    let mut simulated = 0;
    for instrument in &instruments {
        let bars = match source.fetch_bars(instrument) {
            Ok(bars) => bars,
            Err(e @ ImatradeError::NoData { .. }) => {
                eprintln!("warning: skipping {instrument} ({e})");
                continue;
            }
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        eprintln!("Running {}: {} bars", instrument, bars.len());
        let result = match MarketDataProcessor::new(instrument, &strategy, &bt_config)
            .and_then(|processor| processor.run(bars))
        {
            Ok(result) => result,
            Err(e) => {
                eprintln!("error: {instrument}: {e}");
                return (&e).into();
            }
        };

        let metrics = Metrics::compute(&result.ledger, bt_config.initial_capital);
        print_summary(&result, &metrics);

        // Stage 4: reports
        if let Some(dir) = output_dir {
            if let Err(e) = CsvReportAdapter.write(&result, &metrics, dir) {
                eprintln!("error: {e}");
                return (&e).into();
            }
            eprintln!("Reports written to: {}", dir.display());
        }
        simulated += 1;
    }

    if simulated == 0 {
        eprintln!("error: no instruments with data to simulate");
        return ExitCode::from(5);
    }
    ExitCode::SUCCESS
}

pub fn resolve_instruments(instrument_override: Option<&str>, strategy: &Strategy) -> Vec<String> {
    match instrument_override {
        Some(raw) => parse_list(raw),
        None => strategy.instruments.clone(),
    }
}

fn print_summary(result: &SimulationResult, metrics: &Metrics) {
    let summary = &result.summary;
    eprintln!("\n=== {} ({}) ===", result.instrument, result.strategy);
    eprintln!("Bars Processed:   {}", result.processed.len());
    eprintln!("Initial Capital:  {:.2}", summary.initial_capital);
    eprintln!("Final Capital:    {:.2}", summary.current_capital);
    eprintln!("Cumulative P&L:   {:.2}", summary.cumulative_pnl);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!(
        "Total Trades:     {} ({} won, {} lost, {} even)",
        summary.trade_count, summary.win_count, summary.loss_count, summary.breakeven_count
    );
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Largest Win:      {:.2}", metrics.largest_win);
    eprintln!("Largest Loss:     {:.2}", metrics.largest_loss);
    if !result.open_positions.is_empty() {
        eprintln!("Still Open:       {}", result.open_positions.len());
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, ImatradeError> {
    let initial_capital = read_number(adapter, "backtest", "initial_capital")?.ok_or_else(|| {
        ImatradeError::ConfigMissing {
            section: "backtest".into(),
            key: "initial_capital".into(),
        }
    })?;
    let risk_per_trade = read_number(adapter, "backtest", "risk_per_trade")?.unwrap_or(0.01);

    let mut config = BacktestConfig::new(initial_capital, risk_per_trade);
    config.stop_loss = read_exit_level(adapter, "stop_loss", "stop_loss_pct")?;
    config.take_profit = read_exit_level(adapter, "take_profit", "take_profit_pct")?;
    config.signal_priority = read_signal_priority(adapter)?;
    config.exit_check = read_exit_check(adapter)?;
    config.close_at_end = adapter.get_bool("backtest", "close_at_end", false);
    Ok(config)
}

fn read_exit_level(
    adapter: &dyn ConfigPort,
    price_key: &str,
    pct_key: &str,
) -> Result<Option<ExitLevel>, ImatradeError> {
    if let Some(price) = read_number(adapter, "backtest", price_key)? {
        return Ok(Some(ExitLevel::Price(price)));
    }
    Ok(read_number(adapter, "backtest", pct_key)?.map(ExitLevel::Percent))
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, ImatradeError> {
    let name = adapter
        .get_string("strategy", "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let description = adapter
        .get_string("strategy", "description")
        .unwrap_or_default();
    let instruments = parse_list(
        &adapter
            .get_string("strategy", "instruments")
            .unwrap_or_default(),
    );

    let sizing = match adapter.get_string("strategy", "sizing").as_deref().map(str::trim) {
        Some("fixed") => {
            let quantity = read_number(adapter, "strategy", "quantity")?.ok_or_else(|| {
                ImatradeError::ConfigMissing {
                    section: "strategy".into(),
                    key: "quantity".into(),
                }
            })?;
            SizingPolicy::Fixed(quantity)
        }
        _ => SizingPolicy::RiskBased,
    };

    let indicators = parse_list(
        &adapter
            .get_string("strategy", "indicators")
            .unwrap_or_default(),
    )
    .iter()
    .map(|name| build_indicator_spec(adapter, name))
    .collect::<Result<Vec<_>, _>>()?;

    let strategy = Strategy {
        name,
        description,
        instruments,
        sizing,
        indicators,
        long: build_rule_set(adapter, Direction::Long, RULE_SECTIONS[0])?,
        short: build_rule_set(adapter, Direction::Short, RULE_SECTIONS[1])?,
    };
    strategy.validate()?;
    Ok(strategy)
}

fn build_indicator_spec(adapter: &dyn ConfigPort, name: &str) -> Result<IndicatorSpec, ImatradeError> {
    let section = format!("indicator.{name}");
    let kind = adapter
        .get_string(&section, "type")
        .ok_or_else(|| ImatradeError::ConfigMissing {
            section: section.clone(),
            key: "type".into(),
        })?;
    let mut spec = IndicatorSpec::new(name, kind.trim());
    for key in adapter.keys(&section) {
        if key == "type" {
            continue;
        }
        if let Some(value) = read_number(adapter, &section, &key)? {
            spec = spec.with_param(&key, value);
        }
    }
    Ok(spec)
}

/// `None` when neither section of the pair is present.
fn build_rule_set(
    adapter: &dyn ConfigPort,
    direction: Direction,
    (entry_section, exit_section): (&str, &str),
) -> Result<Option<RuleSet>, ImatradeError> {
    let unmatched = |present: &str, missing: &str| ImatradeError::RuleInvalid {
        reason: format!("[{present}] has no matching [{missing}] section"),
    };
    match (
        adapter.has_section(entry_section),
        adapter.has_section(exit_section),
    ) {
        (false, false) => return Ok(None),
        (true, false) => return Err(unmatched(entry_section, exit_section)),
        (false, true) => return Err(unmatched(exit_section, entry_section)),
        (true, true) => {}
    }
    let conditions = |section: &str| -> Vec<(String, String)> {
        adapter
            .keys(section)
            .into_iter()
            .map(|key| {
                let expression = adapter.get_string(section, &key).unwrap_or_default();
                (key, expression)
            })
            .collect()
    };
    let entry = parse_rule(direction, Phase::Entry, &conditions(entry_section))?;
    let exit = parse_rule(direction, Phase::Exit, &conditions(exit_section))?;
    RuleSet::new(entry, exit).map(Some)
}

fn run_validate(strategy_path: &Path) -> ExitCode {
    let (strategy, bt_config) = match prepare(strategy_path) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };

    // Sizing and indicator parameters are only checked once a processor is built.
    if let Err(e) = MarketDataProcessor::new("validate", &strategy, &bt_config) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("Strategy: {}", strategy.name);
    if !strategy.description.is_empty() {
        eprintln!("  {}", strategy.description);
    }
    eprintln!("Instruments: {}", strategy.instruments.join(", "));
    eprintln!("\nIndicators:");
    for spec in &strategy.indicators {
        eprintln!("  {} ({})", spec.name, spec.kind);
    }
    for rule_set in strategy.rule_sets() {
        for rule in [&rule_set.entry, &rule_set.exit] {
            eprintln!("\n[{}.{}]", rule.direction, rule.phase);
            for condition in &rule.conditions {
                eprintln!("  {} = {}", condition.name, condition);
            }
        }
    }
    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}

fn run_list(data_dir: &Path) -> ExitCode {
    let source = CsvAdapter::new(data_dir.to_path_buf());
    match source.list_instruments() {
        Ok(instruments) => {
            if instruments.is_empty() {
                eprintln!("No instruments found in {}", data_dir.display());
            }
            for instrument in instruments {
                println!("{instrument}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
