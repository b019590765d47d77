//! Price bars and the per-bar record that accumulates indicator and signal
//! columns as the simulation walks the series.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::position::{CloseOutcome, Direction, OpenOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// low <= open, close <= high and all prices finite.
    pub fn is_consistent(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite())
            && self.low <= self.high
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
    }
}

/// Which of the four rule-driven triggers fired on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    LongEntry,
    ShortEntry,
    LongExit,
    ShortExit,
}

impl Trigger {
    /// Default evaluation order: entries before exits, long before short.
    pub const ALL: [Trigger; 4] = [
        Trigger::LongEntry,
        Trigger::ShortEntry,
        Trigger::LongExit,
        Trigger::ShortExit,
    ];

    pub fn from_name(name: &str) -> Option<Trigger> {
        Trigger::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn direction(self) -> Direction {
        match self {
            Trigger::LongEntry | Trigger::LongExit => Direction::Long,
            Trigger::ShortEntry | Trigger::ShortExit => Direction::Short,
        }
    }

    pub fn is_entry(self) -> bool {
        matches!(self, Trigger::LongEntry | Trigger::ShortEntry)
    }

    /// Record key of the signal this trigger reacts to.
    pub fn signal_key(self) -> String {
        let phase = if self.is_entry() { "entry" } else { "exit" };
        format!("Signal.{}.{}", self.direction(), phase)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::LongEntry => "long_entry",
            Trigger::ShortEntry => "short_entry",
            Trigger::LongExit => "long_exit",
            Trigger::ShortExit => "short_exit",
        }
    }
}

/// The position action taken for a bar and what it resulted in.
#[derive(Debug, Clone, PartialEq)]
pub enum BarAction {
    Open {
        trigger: Trigger,
        outcome: OpenOutcome,
    },
    Close {
        trigger: Trigger,
        outcome: CloseOutcome,
    },
}

impl BarAction {
    pub fn trigger(&self) -> Trigger {
        match self {
            BarAction::Open { trigger, .. } | BarAction::Close { trigger, .. } => *trigger,
        }
    }

    /// False when the trigger was accepted but the position handler skipped it.
    pub fn took_effect(&self) -> bool {
        match self {
            BarAction::Open { outcome, .. } => matches!(outcome, OpenOutcome::Opened { .. }),
            BarAction::Close { outcome, .. } => matches!(outcome, CloseOutcome::Closed { .. }),
        }
    }

    /// Short label for the processed-output table.
    pub fn label(&self) -> String {
        let suffix = if self.took_effect() { "" } else { " (skipped)" };
        format!("{}{}", self.trigger().as_str(), suffix)
    }
}

/// One row of the processed-output table.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRecord {
    /// Position of the bar in the input sequence.
    pub index: usize,
    pub bar: Bar,
    /// Indicator outputs keyed `<indicator>_<output>`.
    pub fields: BTreeMap<String, f64>,
    /// Condition results (`C.<name>`) and rule signals (`Signal.<dir>.<phase>`).
    pub flags: BTreeMap<String, bool>,
    /// Every indicator had a full window on this bar.
    pub complete: bool,
    pub action: Option<BarAction>,
}

impl BarRecord {
    pub fn new(index: usize, bar: Bar) -> Self {
        BarRecord {
            index,
            bar,
            fields: BTreeMap::new(),
            flags: BTreeMap::new(),
            complete: false,
            action: None,
        }
    }

    /// Resolve a named value: price columns, then indicator fields, then
    /// flags (as 1.0 / 0.0).
    pub fn value(&self, name: &str) -> Option<f64> {
        match name {
            "open" => Some(self.bar.open),
            "high" => Some(self.bar.high),
            "low" => Some(self.bar.low),
            "close" => Some(self.bar.close),
            "volume" => Some(self.bar.volume),
            _ => self
                .fields
                .get(name)
                .copied()
                .or_else(|| self.flags.get(name).map(|&f| if f { 1.0 } else { 0.0 })),
        }
    }

    pub fn set_field(&mut self, name: String, value: f64) {
        self.fields.insert(name, value);
    }

    pub fn set_flag(&mut self, name: String, value: bool) {
        self.flags.insert(name, value);
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn signal(&self, trigger: Trigger) -> bool {
        self.flag(&trigger.signal_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            open: 1.2340,
            high: 1.2360,
            low: 1.2330,
            close: 1.2350,
            volume: 1200.0,
        }
    }

    #[test]
    fn consistent_bar() {
        assert!(sample_bar().is_consistent());
    }

    #[test]
    fn inconsistent_bar_close_above_high() {
        let mut bar = sample_bar();
        bar.close = 1.2400;
        assert!(!bar.is_consistent());
    }

    #[test]
    fn inconsistent_bar_nan() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(!bar.is_consistent());
    }

    #[test]
    fn value_resolves_price_columns() {
        let record = BarRecord::new(0, sample_bar());
        assert_eq!(record.value("close"), Some(1.2350));
        assert_eq!(record.value("high"), Some(1.2360));
        assert_eq!(record.value("volume"), Some(1200.0));
    }

    #[test]
    fn value_resolves_fields_then_flags() {
        let mut record = BarRecord::new(0, sample_bar());
        record.set_field("rsi_value".into(), 42.0);
        record.set_flag("C.oversold".into(), true);
        assert_eq!(record.value("rsi_value"), Some(42.0));
        assert_eq!(record.value("C.oversold"), Some(1.0));
        assert_eq!(record.value("missing"), None);
    }

    #[test]
    fn signal_keys() {
        assert_eq!(Trigger::LongEntry.signal_key(), "Signal.long.entry");
        assert_eq!(Trigger::ShortExit.signal_key(), "Signal.short.exit");
    }

    #[test]
    fn trigger_names_round_trip() {
        for trigger in Trigger::ALL {
            assert_eq!(Trigger::from_name(trigger.as_str()), Some(trigger));
        }
        assert_eq!(Trigger::from_name("long"), None);
    }

    #[test]
    fn signal_defaults_to_false() {
        let mut record = BarRecord::new(3, sample_bar());
        assert!(!record.signal(Trigger::LongEntry));
        record.set_flag("Signal.long.entry".into(), true);
        assert!(record.signal(Trigger::LongEntry));
    }

    #[test]
    fn skipped_action_label() {
        let action = BarAction::Open {
            trigger: Trigger::LongEntry,
            outcome: OpenOutcome::AlreadyOpen,
        };
        assert!(!action.took_effect());
        assert_eq!(action.label(), "long_entry (skipped)");
    }
}
