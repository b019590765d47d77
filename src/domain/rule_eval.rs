//! Rule evaluation against a bar record.
//!
//! - Field operands resolve through [`BarRecord::value`]; a name the record
//!   does not carry is an [`ImatradeError::UnresolvedOperand`]
//! - `==` compares within `1e-9`
//! - Comparisons involving NaN are false
//! - A rule's signal is the AND of every condition. All conditions are
//!   evaluated so each `C.<name>` flag is recorded

use crate::domain::bar::BarRecord;
use crate::domain::error::ImatradeError;
use crate::domain::rule::{Comparison, Condition, Operand, Rule, RuleSet};

const EPSILON: f64 = 1e-9;

impl Comparison {
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Lt => left < right,
            Comparison::Gt => left > right,
            Comparison::Le => left <= right,
            Comparison::Ge => left >= right,
            Comparison::Eq => (left - right).abs() < EPSILON,
        }
    }
}

fn resolve_operand(
    operand: &Operand,
    record: &BarRecord,
    condition: &str,
) -> Result<f64, ImatradeError> {
    match operand {
        Operand::Literal(value) => Ok(*value),
        Operand::Field(name) => {
            record
                .value(name)
                .ok_or_else(|| ImatradeError::UnresolvedOperand {
                    condition: condition.to_string(),
                    operand: name.clone(),
                })
        }
    }
}

impl Condition {
    pub fn evaluate(&self, record: &BarRecord) -> Result<bool, ImatradeError> {
        let left = resolve_operand(&self.left, record, &self.name)?;
        let right = resolve_operand(&self.right, record, &self.name)?;
        Ok(self.op.compare(left, right))
    }
}

impl Rule {
    /// Evaluate without touching the record.
    pub fn evaluate(&self, record: &BarRecord) -> Result<bool, ImatradeError> {
        let mut all = true;
        for condition in &self.conditions {
            all &= condition.evaluate(record)?;
        }
        Ok(all)
    }

    /// Evaluate every condition, write `C.<name>` for each and the
    /// conjunction under the rule's signal key. Returns the signal.
    pub fn apply(&self, record: &mut BarRecord) -> Result<bool, ImatradeError> {
        let results = self
            .conditions
            .iter()
            .map(|c| c.evaluate(record))
            .collect::<Result<Vec<_>, _>>()?;
        for (condition, &result) in self.conditions.iter().zip(&results) {
            record.set_flag(condition.flag_key(), result);
        }
        let signal = results.iter().all(|&r| r);
        record.set_flag(self.signal_key(), signal);
        Ok(signal)
    }
}

impl RuleSet {
    /// Apply entry then exit. Returns `(entry_signal, exit_signal)`.
    pub fn apply(&self, record: &mut BarRecord) -> Result<(bool, bool), ImatradeError> {
        let entry = self.entry.apply(record)?;
        let exit = self.exit.apply(record)?;
        Ok((entry, exit))
    }
}
