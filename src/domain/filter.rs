//! Filter expression model.
//!
//! - `Operand`: What a condition compares (raw column, indicator, constant)
//! - `IndicatorRef`: An indicator with its parameters and the output field to read
//! - `Condition`: `left <operator> right`
//! - `FilterExpression`: A flat AND/OR over 1..=50 conditions
//!
//! Expressions are only built through `filter_parser::parse` (or
//! `FilterExpression::new`) and are immutable afterwards.

use crate::domain::error::{ValidationError, ValidationErrors};
use crate::domain::indicator::cache::IndicatorKey;
use crate::domain::indicator::{IndicatorField, IndicatorType};
use crate::domain::timeframe::Timeframe;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

pub const MAX_CONDITIONS: usize = 50;
/// Largest accepted `offset`.
pub const MAX_OFFSET: usize = 1_000_000;
/// Largest accepted indicator period.
pub const MAX_PERIOD: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "AND" => Some(Logic::And),
            "OR" => Some(Logic::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        Operator::ALL.into_iter().find(|op| op.symbol() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub name: String,
    pub timeframe: Timeframe,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

impl IndicatorRef {
    pub fn new(indicator_type: IndicatorType, field: IndicatorField) -> Self {
        Self {
            indicator_type,
            field,
        }
    }

    /// Name used in filter documents (`sma`, `macd_hist`, `bb_upper`, ...).
    pub fn name(&self) -> &'static str {
        match (self.indicator_type, self.field) {
            (IndicatorType::Sma(_), _) => "sma",
            (IndicatorType::Ema(_), _) => "ema",
            (IndicatorType::Wma(_), _) => "wma",
            (IndicatorType::Rsi(_), _) => "rsi",
            (IndicatorType::Roc(_), _) => "roc",
            (IndicatorType::Stddev(_), _) => "stddev",
            (IndicatorType::Macd { .. }, IndicatorField::MacdSignal) => "macd_signal",
            (IndicatorType::Macd { .. }, IndicatorField::MacdHistogram) => "macd_hist",
            (IndicatorType::Macd { .. }, _) => "macd",
            (IndicatorType::Bollinger { .. }, IndicatorField::BollingerUpper) => "bb_upper",
            (IndicatorType::Bollinger { .. }, IndicatorField::BollingerLower) => "bb_lower",
            (IndicatorType::Bollinger { .. }, _) => "bb_middle",
        }
    }

    /// Resolved parameters in document order. Periods are integers; the
    /// Bollinger multiplier is a float.
    pub fn params(&self) -> Vec<Value> {
        match self.indicator_type {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Wma(n)
            | IndicatorType::Rsi(n)
            | IndicatorType::Roc(n)
            | IndicatorType::Stddev(n) => vec![Value::from(n)],
            IndicatorType::Macd { fast, slow, signal } => {
                vec![Value::from(fast), Value::from(slow), Value::from(signal)]
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => vec![
                Value::from(period),
                Value::from(stddev_mult_x100 as f64 / 100.0),
            ],
        }
    }

    pub fn min_history(&self) -> usize {
        self.indicator_type.min_history()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorOperand {
    pub indicator: IndicatorRef,
    pub column: String,
    pub timeframe: Timeframe,
    pub offset: usize,
}

impl IndicatorOperand {
    pub fn cache_key(&self) -> IndicatorKey {
        IndicatorKey::new(self.indicator.indicator_type, &self.column, self.timeframe)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    Indicator(IndicatorOperand),
    Constant(f64),
}

impl Operand {
    pub fn column(name: &str) -> Self {
        Operand::Column(ColumnRef {
            name: name.to_string(),
            timeframe: Timeframe::default(),
            offset: 0,
        })
    }

    pub fn indicator(indicator: IndicatorRef, column: &str) -> Self {
        Operand::Indicator(IndicatorOperand {
            indicator,
            column: column.to_string(),
            timeframe: Timeframe::default(),
            offset: 0,
        })
    }

    /// Rows of history needed at the operand's timeframe, counting the current
    /// row. Constants need none.
    pub fn lookback(&self) -> usize {
        match self {
            Operand::Column(c) => c.offset.saturating_add(1),
            Operand::Indicator(i) => i.offset.saturating_add(i.indicator.min_history()),
            Operand::Constant(_) => 0,
        }
    }

    pub fn timeframe(&self) -> Option<Timeframe> {
        match self {
            Operand::Column(c) => Some(c.timeframe),
            Operand::Indicator(i) => Some(i.timeframe),
            Operand::Constant(_) => None,
        }
    }

    /// Source column read by this operand, if any.
    pub fn source_column(&self) -> Option<&str> {
        match self {
            Operand::Column(c) => Some(&c.name),
            Operand::Indicator(i) => Some(&i.column),
            Operand::Constant(_) => None,
        }
    }
}

impl Serialize for Operand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Operand::Column(c) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("type", "column")?;
                map.serialize_entry("name", &c.name)?;
                map.serialize_entry("timeframe", &c.timeframe)?;
                map.serialize_entry("offset", &c.offset)?;
                map.end()
            }
            Operand::Indicator(i) => {
                let mut map = serializer.serialize_map(Some(6))?;
                map.serialize_entry("type", "indicator")?;
                map.serialize_entry("name", i.indicator.name())?;
                map.serialize_entry("params", &i.indicator.params())?;
                map.serialize_entry("column", &i.column)?;
                map.serialize_entry("timeframe", &i.timeframe)?;
                map.serialize_entry("offset", &i.offset)?;
                map.end()
            }
            Operand::Constant(v) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "constant")?;
                map.serialize_entry("value", v)?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub left: Operand,
    pub operator: Operator,
    pub right: Operand,
}

impl Condition {
    pub fn new(left: Operand, operator: Operator, right: Operand) -> Self {
        Self {
            left,
            operator,
            right,
        }
    }

    pub fn lookback(&self) -> usize {
        self.left.lookback().max(self.right.lookback())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterExpression {
    logic: Logic,
    conditions: Vec<Condition>,
}

impl FilterExpression {
    /// Build an expression from already-typed parts. Only the condition count
    /// can be wrong at this point.
    pub fn new(logic: Logic, conditions: Vec<Condition>) -> Result<Self, ValidationErrors> {
        if conditions.is_empty() || conditions.len() > MAX_CONDITIONS {
            return Err(ValidationErrors::single(ValidationError::schema(
                "/conditions",
                format!(
                    "must contain between 1 and {MAX_CONDITIONS} conditions, found {}",
                    conditions.len()
                ),
            )));
        }
        Ok(Self { logic, conditions })
    }

    pub fn logic(&self) -> Logic {
        self.logic
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Rows of base history needed before a position may be evaluated.
    /// A filter of constants only needs the current row.
    pub fn lookback_window(&self) -> usize {
        self.conditions
            .iter()
            .map(Condition::lookback)
            .max()
            .unwrap_or(0)
            .max(1)
    }

    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.conditions.iter().flat_map(|c| [&c.left, &c.right])
    }

    /// Every (column, timeframe) pair read directly or as an indicator source.
    pub fn referenced_columns(&self) -> BTreeSet<(Timeframe, String)> {
        self.operands()
            .filter_map(|op| Some((op.timeframe()?, op.source_column()?.to_string())))
            .collect()
    }

    pub fn referenced_timeframes(&self) -> BTreeSet<Timeframe> {
        self.operands().filter_map(Operand::timeframe).collect()
    }

    /// Distinct indicator series the expression needs, in first-use order.
    pub fn extract_indicators(&self) -> Vec<IndicatorKey> {
        let mut keys: Vec<IndicatorKey> = Vec::new();
        for op in self.operands() {
            if let Operand::Indicator(i) = op {
                let key = i.cache_key();
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Canonical JSON with every default written out.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(c) => {
                write!(f, "{}", c.name)?;
                write_addressing(f, c.timeframe, c.offset)
            }
            Operand::Indicator(i) => {
                let params: Vec<String> =
                    i.indicator.params().iter().map(Value::to_string).collect();
                write!(f, "{}({}) of {}", i.indicator.name(), params.join(","), i.column)?;
                write_addressing(f, i.timeframe, i.offset)
            }
            Operand::Constant(v) => write!(f, "{v}"),
        }
    }
}

fn write_addressing(f: &mut fmt::Formatter<'_>, timeframe: Timeframe, offset: usize) -> fmt::Result {
    if timeframe != Timeframe::default() {
        write!(f, " [{timeframe}]")?;
    }
    if offset > 0 {
        write!(f, " [-{offset}]")?;
    }
    Ok(())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator.symbol(), self.right)
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joiner = format!(" {} ", self.logic.as_str());
        let parts: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(&joiner))
    }
}
