//! Filter evaluation engine.
//!
//! Evaluates a `FilterExpression` at one base-timeframe position of a single
//! symbol.
//!
//! # Evaluation Semantics
//!
//! - `Column`: the row `offset` steps back in the operand's timeframe
//! - `Indicator`: the indicator sample `offset` steps back, computed once per symbol
//! - Non-base timeframes align as-of: the latest row dated at or before the base row
//! - An unavailable operand (out of range, warm-up, NaN) makes the condition false
//! - `==`/`!=` compare with a relative tolerance of `EQUALITY_EPSILON`
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`

use crate::domain::error::ScanError;
use crate::domain::filter::{Condition, FilterExpression, IndicatorOperand, Logic, Operand, Operator};
use crate::domain::indicator::cache::IndicatorCache;
use crate::domain::ohlcv::{column_values, OhlcvBar};
use crate::domain::symbol_data::SymbolData;
use crate::domain::timeframe::{resample, Timeframe};
use serde::Serialize;
use std::collections::HashMap;

pub const EQUALITY_EPSILON: f64 = 1e-9;

/// Evaluation state for one symbol: its rows, any derived timeframes and the
/// indicator cache. Dropped when the symbol's scan finishes.
#[derive(Debug)]
pub struct EvalContext<'a> {
    data: &'a SymbolData,
    derived: HashMap<Timeframe, Vec<OhlcvBar>>,
    cache: IndicatorCache,
}

impl<'a> EvalContext<'a> {
    /// Resolve every timeframe and column `expr` references for this symbol.
    ///
    /// Missing coarser timeframes are resampled from the base rows.
    pub fn prepare(data: &'a SymbolData, expr: &FilterExpression) -> Result<Self, ScanError> {
        let mut derived = HashMap::new();
        for timeframe in expr.referenced_timeframes() {
            if data.rows(timeframe).is_some() {
                continue;
            }
            if !timeframe.derivable_from(data.base_timeframe) {
                return Err(ScanError::TimeframeUnavailable {
                    symbol: data.symbol.clone(),
                    timeframe,
                    base: data.base_timeframe,
                });
            }
            derived.insert(timeframe, resample(data.base_rows(), timeframe));
        }

        let ctx = Self {
            data,
            derived,
            cache: IndicatorCache::new(),
        };

        for (timeframe, column) in expr.referenced_columns() {
            let present = ctx
                .rows(timeframe)
                .iter()
                .any(|row| row.has_column(&column));
            if !present {
                return Err(ScanError::UnresolvedOperand {
                    symbol: data.symbol.clone(),
                    column,
                    timeframe,
                });
            }
        }

        Ok(ctx)
    }

    pub fn symbol(&self) -> &str {
        &self.data.symbol
    }

    pub fn base_rows(&self) -> &'a [OhlcvBar] {
        self.data.base_rows()
    }

    pub fn rows(&self, timeframe: Timeframe) -> &[OhlcvBar] {
        match self.derived.get(&timeframe) {
            Some(rows) => rows,
            None => self.data.rows(timeframe).unwrap_or(&[]),
        }
    }

    pub fn cache(&self) -> &IndicatorCache {
        &self.cache
    }

    /// Index into `timeframe` rows of the latest row dated at or before the
    /// base row at `position`.
    fn aligned_index(&self, timeframe: Timeframe, position: usize) -> Option<usize> {
        let base = self.base_rows();
        if timeframe == self.data.base_timeframe {
            return (position < base.len()).then_some(position);
        }
        let as_of = base.get(position)?.date;
        let rows = self.rows(timeframe);
        rows.partition_point(|r| r.date <= as_of).checked_sub(1)
    }

    fn indicator_value(&mut self, operand: &IndicatorOperand, index: usize) -> Option<f64> {
        let key = operand.cache_key();
        let rows: &[OhlcvBar] = match self.derived.get(&operand.timeframe) {
            Some(rows) => rows,
            None => self.data.rows(operand.timeframe)?,
        };
        let series = self
            .cache
            .get_or_compute(&key, || column_values(rows, &operand.column));
        series.reading(index, operand.indicator.field).value()
    }
}

/// Value of `operand` at base `position`, or `None` when it is unavailable.
pub fn resolve_operand(operand: &Operand, ctx: &mut EvalContext<'_>, position: usize) -> Option<f64> {
    match operand {
        Operand::Constant(v) => Some(*v),
        Operand::Column(column) => {
            let index = ctx
                .aligned_index(column.timeframe, position)?
                .checked_sub(column.offset)?;
            ctx.rows(column.timeframe)
                .get(index)?
                .column(&column.name)
                .filter(|v| v.is_finite())
        }
        Operand::Indicator(indicator) => {
            let index = ctx
                .aligned_index(indicator.timeframe, position)?
                .checked_sub(indicator.offset)?;
            ctx.indicator_value(indicator, index)
        }
    }
}

/// Apply `op` to two available values.
pub fn compare(op: Operator, left: f64, right: f64) -> bool {
    match op {
        Operator::Gt => left > right,
        Operator::Lt => left < right,
        Operator::Ge => left >= right,
        Operator::Le => left <= right,
        Operator::Eq => approx_eq(left, right),
        Operator::Ne => !approx_eq(left, right),
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= EQUALITY_EPSILON * scale
}

pub fn evaluate_condition(condition: &Condition, ctx: &mut EvalContext<'_>, position: usize) -> bool {
    let Some(left) = resolve_operand(&condition.left, ctx, position) else {
        return false;
    };
    let Some(right) = resolve_operand(&condition.right, ctx, position) else {
        return false;
    };
    compare(condition.operator, left, right)
}

pub fn evaluate(expr: &FilterExpression, ctx: &mut EvalContext<'_>, position: usize) -> bool {
    match expr.logic() {
        Logic::And => {
            for c in expr.conditions() {
                if !evaluate_condition(c, ctx, position) {
                    return false;
                }
            }
            true
        }
        Logic::Or => {
            for c in expr.conditions() {
                if evaluate_condition(c, ctx, position) {
                    return true;
                }
            }
            false
        }
    }
}

/// Resolved operands and outcome of one condition at one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionOutcome {
    pub condition: String,
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub result: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowEvaluation {
    pub matched: bool,
    pub conditions: Vec<ConditionOutcome>,
}

/// Evaluate every condition without short-circuiting.
pub fn explain(expr: &FilterExpression, ctx: &mut EvalContext<'_>, position: usize) -> RowEvaluation {
    let conditions: Vec<ConditionOutcome> = expr
        .conditions()
        .iter()
        .map(|c| {
            let left = resolve_operand(&c.left, ctx, position);
            let right = resolve_operand(&c.right, ctx, position);
            let result = match (left, right) {
                (Some(l), Some(r)) => compare(c.operator, l, r),
                _ => false,
            };
            ConditionOutcome {
                condition: c.to_string(),
                left,
                right,
                result,
            }
        })
        .collect();

    let matched = match expr.logic() {
        Logic::And => conditions.iter().all(|c| c.result),
        Logic::Or => conditions.iter().any(|c| c.result),
    };

    RowEvaluation {
        matched,
        conditions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::{ColumnRef, IndicatorRef};
    use crate::domain::indicator::{IndicatorField, IndicatorType};
    use chrono::{Duration, NaiveDate};

    fn make_bar(day: i64, close: f64) -> OhlcvBar {
        // 2024-01-01 is a Monday
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(day);
        OhlcvBar::new(
            "TEST",
            date.and_hms_opt(0, 0, 0).unwrap(),
            close,
            close + 1.0,
            close - 1.0,
            close,
            1000.0,
        )
    }

    fn daily(closes: &[f64]) -> SymbolData {
        let rows = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i as i64, c))
            .collect();
        SymbolData::new("TEST", Timeframe::Daily, rows)
    }

    fn column(name: &str, timeframe: Timeframe, offset: usize) -> Operand {
        Operand::Column(ColumnRef {
            name: name.into(),
            timeframe,
            offset,
        })
    }

    fn sma(period: usize) -> Operand {
        Operand::indicator(
            IndicatorRef::new(IndicatorType::Sma(period), IndicatorField::Value),
            "close",
        )
    }

    fn single(left: Operand, operator: Operator, right: Operand) -> FilterExpression {
        FilterExpression::new(Logic::And, vec![Condition::new(left, operator, right)]).unwrap()
    }

    #[test]
    fn close_gt_constant() {
        let data = daily(&[90.0, 95.0, 105.0, 120.0]);
        let expr = single(Operand::column("close"), Operator::Gt, Operand::Constant(100.0));
        let mut ctx = EvalContext::prepare(&data, &expr).unwrap();

        let matches: Vec<bool> = (0..4).map(|p| evaluate(&expr, &mut ctx, p)).collect();
        assert_eq!(matches, vec![false, false, true, true]);
    }

    #[test]
    fn offset_reads_previous_row() {
        let data = daily(&[10.0, 20.0, 30.0]);
        let expr = single(
            Operand::column("close"),
            Operator::Gt,
            column("close", Timeframe::Daily, 1),
        );
        let mut ctx = EvalContext::prepare(&data, &expr).unwrap();

        assert!(!evaluate(&expr, &mut ctx, 0), "offset before first row is unavailable");
        assert!(evaluate(&expr, &mut ctx, 1));
        assert!(evaluate(&expr, &mut ctx, 2));
    }

    #[test]
    fn indicator_warmup_is_false_not_panic() {
        let data = daily(&[1.0, 2.0, 3.0, 4.0]);
        let expr = single(sma(3), Operator::Gt, Operand::Constant(0.0));
        let mut ctx = EvalContext::prepare(&data, &expr).unwrap();

        assert!(!evaluate(&expr, &mut ctx, 0));
        assert!(!evaluate(&expr, &mut ctx, 1));
        assert!(evaluate(&expr, &mut ctx, 2));
        assert!(!evaluate(&expr, &mut ctx, 99));
    }

    #[test]
    fn indicator_series_computed_once() {
        let data = daily(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let expr = FilterExpression::new(
            Logic::And,
            vec![
                Condition::new(sma(2), Operator::Gt, Operand::Constant(0.0)),
                Condition::new(Operand::column("close"), Operator::Ge, sma(2)),
            ],
        )
        .unwrap();
        let mut ctx = EvalContext::prepare(&data, &expr).unwrap();
        for p in 0..5 {
            evaluate(&expr, &mut ctx, p);
        }
        assert_eq!(ctx.cache().computations(), 1);
    }

    #[test]
    fn equality_uses_relative_tolerance() {
        assert!(compare(Operator::Eq, 0.1 + 0.2, 0.3));
        assert!(compare(Operator::Eq, 1e12, 1e12 + 1e-4));
        assert!(!compare(Operator::Eq, 100.01, 100.0));
        assert!(compare(Operator::Ne, 100.01, 100.0));
        assert!(!compare(Operator::Ne, 0.1 + 0.2, 0.3));
    }

    #[test]
    fn nan_column_value_never_matches() {
        let data = daily(&[f64::NAN, 5.0]);
        let expr = single(Operand::column("close"), Operator::Ne, Operand::Constant(1.0));
        let mut ctx = EvalContext::prepare(&data, &expr).unwrap();
        assert!(!evaluate(&expr, &mut ctx, 0));
        assert!(evaluate(&expr, &mut ctx, 1));
    }

    #[test]
    fn or_short_circuits_and_and_requires_all() {
        let data = daily(&[50.0]);
        let gt = Condition::new(Operand::column("close"), Operator::Gt, Operand::Constant(10.0));
        let lt = Condition::new(Operand::column("close"), Operator::Lt, Operand::Constant(10.0));

        let and = FilterExpression::new(Logic::And, vec![gt.clone(), lt.clone()]).unwrap();
        let or = FilterExpression::new(Logic::Or, vec![lt, gt]).unwrap();

        let mut ctx = EvalContext::prepare(&data, &and).unwrap();
        assert!(!evaluate(&and, &mut ctx, 0));
        assert!(evaluate(&or, &mut ctx, 0));
    }

    #[test]
    fn explain_agrees_with_evaluate() {
        let data = daily(&[1.0, 2.0, 3.0, 4.0]);
        let expr = FilterExpression::new(
            Logic::Or,
            vec![
                Condition::new(sma(3), Operator::Gt, Operand::Constant(2.5)),
                Condition::new(Operand::column("close"), Operator::Eq, Operand::Constant(2.0)),
            ],
        )
        .unwrap();
        let mut ctx = EvalContext::prepare(&data, &expr).unwrap();

        for p in 0..4 {
            let explained = explain(&expr, &mut ctx, p);
            assert_eq!(explained.matched, evaluate(&expr, &mut ctx, p), "position {p}");
            assert_eq!(explained.conditions.len(), 2);
        }

        let first = explain(&expr, &mut ctx, 0);
        assert_eq!(first.conditions[0].left, None);
        assert_eq!(first.conditions[1].left, Some(1.0));
    }

    #[test]
    fn weekly_operand_aligns_as_of() {
        // Mon 2024-01-01 .. Fri 2024-01-12, two ISO weeks of five days each
        let closes: Vec<f64> = (1..=10).map(|c| c as f64).collect();
        let rows: Vec<OhlcvBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let day = if i < 5 { i as i64 } else { i as i64 + 2 };
                make_bar(day, c)
            })
            .collect();
        let data = SymbolData::new("TEST", Timeframe::Daily, rows);

        let expr = single(
            column("close", Timeframe::Weekly, 0),
            Operator::Eq,
            Operand::Constant(5.0),
        );
        let mut ctx = EvalContext::prepare(&data, &expr).unwrap();

        // the first weekly bar is stamped Friday, so mid-week rows see nothing
        assert_eq!(resolve_operand(&expr.conditions()[0].left, &mut ctx, 2), None);
        assert!(evaluate(&expr, &mut ctx, 4));
        assert!(evaluate(&expr, &mut ctx, 7));
        assert!(!evaluate(&expr, &mut ctx, 9));

        let prev_week = column("close", Timeframe::Weekly, 1);
        assert_eq!(resolve_operand(&prev_week, &mut ctx, 9), Some(5.0));
    }

    #[test]
    fn missing_column_is_unresolved() {
        let data = daily(&[1.0, 2.0]);
        let expr = single(Operand::column("pe"), Operator::Gt, Operand::Constant(1.0));
        let err = EvalContext::prepare(&data, &expr).unwrap_err();
        assert!(matches!(err, ScanError::UnresolvedOperand { ref column, .. } if column == "pe"));
    }

    #[test]
    fn finer_timeframe_than_base_is_unavailable() {
        let data = daily(&[1.0, 2.0]);
        let expr = single(
            column("close", Timeframe::Intraday, 0),
            Operator::Gt,
            Operand::Constant(1.0),
        );
        let err = EvalContext::prepare(&data, &expr).unwrap_err();
        assert!(matches!(err, ScanError::TimeframeUnavailable { .. }));
    }
}
