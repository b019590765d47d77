//! Strategy definition: instruments, sizing, indicators and rule sets.

use std::collections::BTreeSet;

use crate::domain::error::ImatradeError;
use crate::domain::financial::SizingPolicy;
use crate::domain::indicator::IndicatorSpec;
use crate::domain::position::Direction;
use crate::domain::rule::RuleSet;

#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    pub instruments: Vec<String>,
    pub sizing: SizingPolicy,
    pub indicators: Vec<IndicatorSpec>,
    pub long: Option<RuleSet>,
    pub short: Option<RuleSet>,
}

impl Strategy {
    pub fn rule_set(&self, direction: Direction) -> Option<&RuleSet> {
        match direction {
            Direction::Long => self.long.as_ref(),
            Direction::Short => self.short.as_ref(),
        }
    }

    /// Enabled rule sets, long first.
    pub fn rule_sets(&self) -> impl Iterator<Item = &RuleSet> {
        self.long.iter().chain(self.short.iter())
    }

    /// Structural checks that do not need any data.
    pub fn validate(&self) -> Result<(), ImatradeError> {
        if self.long.is_none() && self.short.is_none() {
            return Err(ImatradeError::RuleInvalid {
                reason: format!("strategy '{}' has no long or short rules", self.name),
            });
        }
        for (slot, set) in [(Direction::Long, &self.long), (Direction::Short, &self.short)] {
            if let Some(set) = set {
                if set.direction != slot {
                    return Err(ImatradeError::RuleInvalid {
                        reason: format!("{} rule set stored as {slot}", set.direction),
                    });
                }
            }
        }

        // Every condition writes `C.<name>`, so names are shared across rules.
        let mut conditions = BTreeSet::new();
        for set in self.rule_sets() {
            for rule in [&set.entry, &set.exit] {
                for condition in &rule.conditions {
                    if !conditions.insert(condition.name.as_str()) {
                        return Err(ImatradeError::RuleInvalid {
                            reason: format!(
                                "condition '{}' in {} {} rule is already defined by another rule",
                                condition.name, rule.direction, rule.phase
                            ),
                        });
                    }
                }
            }
        }

        let mut seen = BTreeSet::new();
        for spec in &self.indicators {
            if !seen.insert(spec.name.as_str()) {
                return Err(ImatradeError::ConfigInvalid {
                    section: "strategy".to_string(),
                    key: "indicators".to_string(),
                    reason: format!("indicator '{}' listed twice", spec.name),
                });
            }
        }

        if let SizingPolicy::Fixed(quantity) = self.sizing {
            if !(quantity > 0.0 && quantity.is_finite()) {
                return Err(ImatradeError::ConfigInvalid {
                    section: "strategy".to_string(),
                    key: "quantity".to_string(),
                    reason: "must be a positive number".to_string(),
                });
            }
        }
        Ok(())
    }
}
