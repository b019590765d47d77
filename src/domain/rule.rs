//! Condition and rule AST.
//!
//! A `Condition` compares two operands, each either a field of the bar
//! record or a literal number. A `Rule` is the conjunction of an ordered list
//! of conditions for one direction and phase, and a `RuleSet` pairs the
//! entry and exit rules of one direction.

use std::fmt;

use crate::domain::error::ImatradeError;
use crate::domain::position::Direction;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Price column, indicator field (`<indicator>_<key>`) or flag.
    Field(String),
    Literal(f64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(name) => f.write_str(name),
            Operand::Literal(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Lt,
    Gt,
    Eq,
    Le,
    Ge,
}

impl Comparison {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Gt => ">",
            Comparison::Eq => "==",
            Comparison::Le => "<=",
            Comparison::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub name: String,
    pub left: Operand,
    pub op: Comparison,
    pub right: Operand,
}

impl Condition {
    /// Record key the evaluated result is written under.
    pub fn flag_key(&self) -> String {
        format!("C.{}", self.name)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Entry,
    Exit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Entry => write!(f, "entry"),
            Phase::Exit => write!(f, "exit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub direction: Direction,
    pub phase: Phase,
    pub conditions: Vec<Condition>,
}

impl Rule {
    /// A rule needs at least one condition; an empty conjunction would fire
    /// on every bar.
    pub fn new(
        direction: Direction,
        phase: Phase,
        conditions: Vec<Condition>,
    ) -> Result<Self, ImatradeError> {
        if conditions.is_empty() {
            return Err(ImatradeError::RuleInvalid {
                reason: format!("{direction} {phase} rule has no conditions"),
            });
        }
        for (i, condition) in conditions.iter().enumerate() {
            if conditions[..i].iter().any(|c| c.name == condition.name) {
                return Err(ImatradeError::RuleInvalid {
                    reason: format!(
                        "{direction} {phase} rule repeats condition '{}'",
                        condition.name
                    ),
                });
            }
        }
        Ok(Rule {
            direction,
            phase,
            conditions,
        })
    }

    /// Record key the rule's signal is written under.
    pub fn signal_key(&self) -> String {
        format!("Signal.{}.{}", self.direction, self.phase)
    }
}

/// Entry and exit rules for one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub direction: Direction,
    pub entry: Rule,
    pub exit: Rule,
}

impl RuleSet {
    pub fn new(entry: Rule, exit: Rule) -> Result<Self, ImatradeError> {
        if entry.phase != Phase::Entry || exit.phase != Phase::Exit {
            return Err(ImatradeError::RuleInvalid {
                reason: "rule set needs one entry and one exit rule".to_string(),
            });
        }
        if entry.direction != exit.direction {
            return Err(ImatradeError::RuleInvalid {
                reason: format!(
                    "entry rule is {} but exit rule is {}",
                    entry.direction, exit.direction
                ),
            });
        }
        Ok(RuleSet {
            direction: entry.direction,
            entry,
            exit,
        })
    }
}
