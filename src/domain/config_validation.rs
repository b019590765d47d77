//! Configuration validation.
//!
//! Validates every strategy and backtest value before anything is built, so
//! a bad file fails before a single bar is read.

use crate::domain::backtest::{ExitCheckOrder, SignalPriority};
use crate::domain::bar::Trigger;
use crate::domain::error::ImatradeError;
use crate::domain::indicator::INDICATOR_TYPES;
use crate::domain::rule_parser::parse_condition;
use crate::ports::config_port::ConfigPort;
use std::collections::BTreeSet;

/// Rule sections per direction: (entry, exit).
pub const RULE_SECTIONS: [(&str, &str); 2] =
    [("long.entry", "long.exit"), ("short.entry", "short.exit")];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    validate_initial_capital(config)?;
    validate_risk_per_trade(config)?;
    validate_exit_level(config, "stop_loss", "stop_loss_pct", 100.0)?;
    validate_exit_level(config, "take_profit", "take_profit_pct", f64::INFINITY)?;
    validate_signal_priority(config)?;
    validate_exit_check(config)?;
    validate_flag(config, "backtest", "close_at_end")?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    validate_sizing(config)?;
    validate_indicators(config)?;
    validate_rules(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ImatradeError {
    ImatradeError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Split a comma-separated value, dropping empty items.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A numeric value that, when present, must parse.
pub fn read_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, ImatradeError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

pub fn read_signal_priority(config: &dyn ConfigPort) -> Result<SignalPriority, ImatradeError> {
    let Some(raw) = config.get_string("backtest", "signal_priority") else {
        return Ok(SignalPriority::default());
    };
    let triggers = parse_list(&raw)
        .iter()
        .map(|name| {
            Trigger::from_name(name).ok_or_else(|| {
                invalid(
                    "backtest",
                    "signal_priority",
                    format!("unknown trigger '{name}'"),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    SignalPriority::new(&triggers)
}

pub fn read_exit_check(config: &dyn ConfigPort) -> Result<ExitCheckOrder, ImatradeError> {
    match config.get_string("backtest", "exit_check") {
        None => Ok(ExitCheckOrder::default()),
        Some(raw) => ExitCheckOrder::from_name(raw.trim()).ok_or_else(|| {
            invalid(
                "backtest",
                "exit_check",
                "expected before_rules or after_rules",
            )
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    match read_number(config, "backtest", "initial_capital")? {
        None => Err(ImatradeError::ConfigMissing {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
        }),
        Some(v) if v <= 0.0 => Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        )),
        Some(_) => Ok(()),
    }
}

fn validate_risk_per_trade(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    if let Some(v) = read_number(config, "backtest", "risk_per_trade")? {
        if v <= 0.0 || v > 1.0 {
            return Err(invalid(
                "backtest",
                "risk_per_trade",
                "risk_per_trade must be a fraction in (0, 1]",
            ));
        }
    }
    Ok(())
}

fn validate_exit_level(
    config: &dyn ConfigPort,
    price_key: &str,
    pct_key: &str,
    pct_limit: f64,
) -> Result<(), ImatradeError> {
    let price = read_number(config, "backtest", price_key)?;
    let pct = read_number(config, "backtest", pct_key)?;
    if price.is_some() && pct.is_some() {
        return Err(invalid(
            "backtest",
            pct_key,
            format!("set either {price_key} or {pct_key}, not both"),
        ));
    }
    if price.is_some_and(|p| p <= 0.0) {
        return Err(invalid(
            "backtest",
            price_key,
            format!("{price_key} must be a positive price"),
        ));
    }
    if pct.is_some_and(|p| p <= 0.0 || p >= pct_limit) {
        return Err(invalid(
            "backtest",
            pct_key,
            format!("{pct_key} must be above 0 and below {pct_limit}"),
        ));
    }
    Ok(())
}

fn validate_signal_priority(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    read_signal_priority(config).map(|_| ())
}

fn validate_exit_check(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    read_exit_check(config).map(|_| ())
}

fn validate_flag(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), ImatradeError> {
    if let Some(raw) = config.get_string(section, key) {
        // get_bool falls back to the default on anything unrecognised.
        if config.get_bool(section, key, true) != config.get_bool(section, key, false) {
            return Err(invalid(section, key, format!("'{raw}' is not a boolean")));
        }
    }
    Ok(())
}

fn validate_sizing(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    let sizing = config
        .get_string("strategy", "sizing")
        .unwrap_or_else(|| "risk".to_string());
    match sizing.trim() {
        "risk" => Ok(()),
        "fixed" => match read_number(config, "strategy", "quantity")? {
            None => Err(ImatradeError::ConfigMissing {
                section: "strategy".to_string(),
                key: "quantity".to_string(),
            }),
            Some(q) if q <= 0.0 => Err(invalid(
                "strategy",
                "quantity",
                "quantity must be positive",
            )),
            Some(_) => Ok(()),
        },
        other => Err(invalid(
            "strategy",
            "sizing",
            format!("unknown sizing '{other}', expected risk or fixed"),
        )),
    }
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    let names = parse_list(&config.get_string("strategy", "indicators").unwrap_or_default());
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(invalid(
                "strategy",
                "indicators",
                format!("indicator '{name}' listed twice"),
            ));
        }
        let section = format!("indicator.{name}");
        if !config.has_section(&section) {
            return Err(invalid(
                "strategy",
                "indicators",
                format!("no [{section}] section"),
            ));
        }
        let kind = config
            .get_string(&section, "type")
            .ok_or_else(|| ImatradeError::ConfigMissing {
                section: section.clone(),
                key: "type".to_string(),
            })?;
        if !INDICATOR_TYPES.contains(&kind.trim()) {
            return Err(ImatradeError::UnknownIndicator {
                name: kind.trim().to_string(),
            });
        }
        for key in config.keys(&section) {
            if key != "type" {
                read_number(config, &section, &key)?;
            }
        }
    }
    Ok(())
}

fn validate_rules(config: &dyn ConfigPort) -> Result<(), ImatradeError> {
    let mut enabled = 0;
    let mut names = BTreeSet::new();
    for (entry, exit) in RULE_SECTIONS {
        match (config.has_section(entry), config.has_section(exit)) {
            (false, false) => continue,
            (true, false) | (false, true) => {
                let (present, missing) = if config.has_section(entry) {
                    (entry, exit)
                } else {
                    (exit, entry)
                };
                return Err(ImatradeError::RuleInvalid {
                    reason: format!("[{present}] has no matching [{missing}] section"),
                });
            }
            (true, true) => enabled += 1,
        }
        for section in [entry, exit] {
            let keys = config.keys(section);
            if keys.is_empty() {
                return Err(ImatradeError::RuleInvalid {
                    reason: format!("[{section}] has no conditions"),
                });
            }
            for key in keys {
                let expression = config.get_string(section, &key).unwrap_or_default();
                parse_condition(&key, &expression)?;
                if !names.insert(key.clone()) {
                    return Err(ImatradeError::RuleInvalid {
                        reason: format!("condition '{key}' in [{section}] is already defined"),
                    });
                }
            }
        }
    }
    if enabled == 0 {
        return Err(ImatradeError::RuleInvalid {
            reason: "no [long.entry]/[long.exit] or [short.entry]/[short.exit] sections"
                .to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID_STRATEGY: &str = r#"
[strategy]
name = Envelope
sizing = fixed
quantity = 100
indicators = env

[indicator.env]
type = ma_envelope
ma_period = 14
ma_distance = 0.01

[long.entry]
below_band = close < env_lower_band

[long.exit]
above_ma = close > env_ma
"#;

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_capital = 10000
risk_per_trade = 0.01
stop_loss_pct = 2
take_profit = 1.25
signal_priority = long_exit, short_exit, long_entry, short_entry
exit_check = after_rules
close_at_end = true
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn initial_capital_is_required_and_positive() {
        let missing = make_config("[backtest]\nrisk_per_trade = 0.01\n");
        assert!(matches!(
            validate_backtest_config(&missing),
            Err(ImatradeError::ConfigMissing { .. })
        ));
        let zero = make_config("[backtest]\ninitial_capital = 0\n");
        assert!(matches!(
            validate_backtest_config(&zero),
            Err(ImatradeError::ConfigInvalid { ref key, .. }) if key == "initial_capital"
        ));
        let text = make_config("[backtest]\ninitial_capital = lots\n");
        assert!(validate_backtest_config(&text).is_err());
    }

    #[test]
    fn risk_per_trade_is_a_fraction() {
        let config = make_config("[backtest]\ninitial_capital = 100\nrisk_per_trade = 2\n");
        assert!(matches!(
            validate_backtest_config(&config),
            Err(ImatradeError::ConfigInvalid { ref key, .. }) if key == "risk_per_trade"
        ));
    }

    #[test]
    fn stop_price_and_percent_are_exclusive() {
        let config = make_config(
            "[backtest]\ninitial_capital = 100\nstop_loss = 1.23\nstop_loss_pct = 1\n",
        );
        assert!(validate_backtest_config(&config).is_err());
    }

    #[test]
    fn stop_percent_must_be_below_100() {
        let config = make_config("[backtest]\ninitial_capital = 100\nstop_loss_pct = 100\n");
        assert!(validate_backtest_config(&config).is_err());
    }

    #[test]
    fn signal_priority_must_name_all_triggers() {
        let config = make_config(
            "[backtest]\ninitial_capital = 100\nsignal_priority = long_entry, long_exit\n",
        );
        assert!(matches!(
            validate_backtest_config(&config),
            Err(ImatradeError::ConfigInvalid { ref key, .. }) if key == "signal_priority"
        ));
        let unknown = make_config(
            "[backtest]\ninitial_capital = 100\nsignal_priority = buy, sell, hold, wait\n",
        );
        assert!(validate_backtest_config(&unknown).is_err());
    }

    #[test]
    fn exit_check_and_flag_values() {
        let config = make_config("[backtest]\ninitial_capital = 100\nexit_check = sometimes\n");
        assert!(validate_backtest_config(&config).is_err());
        let config = make_config("[backtest]\ninitial_capital = 100\nclose_at_end = maybe\n");
        assert!(matches!(
            validate_backtest_config(&config),
            Err(ImatradeError::ConfigInvalid { ref key, .. }) if key == "close_at_end"
        ));
    }

    #[test]
    fn valid_strategy_config_passes() {
        assert!(validate_strategy_config(&make_config(VALID_STRATEGY)).is_ok());
    }

    #[test]
    fn fixed_sizing_needs_quantity() {
        let config = make_config(&VALID_STRATEGY.replace("quantity = 100\n", ""));
        assert!(matches!(
            validate_strategy_config(&config),
            Err(ImatradeError::ConfigMissing { ref key, .. }) if key == "quantity"
        ));
    }

    #[test]
    fn unknown_sizing_fails() {
        let config = make_config(&VALID_STRATEGY.replace("sizing = fixed", "sizing = kelly"));
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn listed_indicator_needs_section() {
        let config = make_config(&VALID_STRATEGY.replace("indicators = env", "indicators = env, rsi"));
        assert!(matches!(
            validate_strategy_config(&config),
            Err(ImatradeError::ConfigInvalid { ref key, .. }) if key == "indicators"
        ));
    }

    #[test]
    fn unknown_indicator_type_fails() {
        let config = make_config(&VALID_STRATEGY.replace("type = ma_envelope", "type = vwap"));
        assert!(matches!(
            validate_strategy_config(&config),
            Err(ImatradeError::UnknownIndicator { ref name }) if name == "vwap"
        ));
    }

    #[test]
    fn non_numeric_indicator_param_fails() {
        let config = make_config(&VALID_STRATEGY.replace("ma_period = 14", "ma_period = fourteen"));
        assert!(matches!(
            validate_strategy_config(&config),
            Err(ImatradeError::ConfigInvalid { ref section, .. }) if section == "indicator.env"
        ));
    }

    #[test]
    fn half_a_rule_set_fails() {
        let config = make_config(&VALID_STRATEGY.replace("[long.exit]", "[short.exit]"));
        assert!(matches!(
            validate_strategy_config(&config),
            Err(ImatradeError::RuleInvalid { .. })
        ));
    }

    #[test]
    fn condition_name_reused_in_another_section_fails() {
        let config = make_config(&format!(
            "{VALID_STRATEGY}\n[short.entry]\nbelow_band = close > env_upper_band\n\n[short.exit]\nback = close < env_ma\n"
        ));
        match validate_strategy_config(&config) {
            Err(ImatradeError::RuleInvalid { reason }) => {
                assert!(reason.contains("'below_band' in [short.entry]"), "{reason}");
            }
            other => panic!("expected RuleInvalid, got {other:?}"),
        }
    }

    #[test]
    fn malformed_condition_fails() {
        let config = make_config(&VALID_STRATEGY.replace(
            "close < env_lower_band",
            "close env_lower_band",
        ));
        assert!(matches!(
            validate_strategy_config(&config),
            Err(ImatradeError::RuleParse { ref condition, .. }) if condition == "below_band"
        ));
    }

    #[test]
    fn strategy_without_rules_fails() {
        let config = make_config("[strategy]\nname = Empty\n");
        assert!(matches!(
            validate_strategy_config(&config),
            Err(ImatradeError::RuleInvalid { .. })
        ));
    }

    #[test]
    fn parse_list_trims_and_drops_empty() {
        assert_eq!(parse_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(parse_list("").is_empty());
    }
}
