//! Filter document parser.
//!
//! Validates an external JSON document and builds a `FilterExpression` in one
//! pass. Every violation is collected with its JSON pointer path; nothing is
//! returned unless the whole document is valid.

use crate::domain::error::{ValidationError, ValidationErrors};
use crate::domain::filter::{
    ColumnRef, Condition, FilterExpression, IndicatorOperand, IndicatorRef, Logic, Operand,
    Operator, MAX_CONDITIONS, MAX_OFFSET, MAX_PERIOD,
};
use crate::domain::indicator::{bollinger, macd, roc, rsi, IndicatorField, IndicatorType};
use crate::domain::timeframe::Timeframe;
use serde_json::{Map, Value};

const TOP_LEVEL_KEYS: [&str; 2] = ["logic", "conditions"];
const CONDITION_KEYS: [&str; 3] = ["left", "operator", "right"];
const COLUMN_KEYS: [&str; 4] = ["type", "name", "timeframe", "offset"];
const INDICATOR_KEYS: [&str; 6] = ["type", "name", "params", "column", "timeframe", "offset"];
const CONSTANT_KEYS: [&str; 2] = ["type", "value"];

/// Indicator names accepted in filter documents.
pub const INDICATOR_NAMES: [&str; 12] = [
    "sma",
    "ema",
    "wma",
    "rsi",
    "roc",
    "stddev",
    "macd",
    "macd_signal",
    "macd_hist",
    "bb_upper",
    "bb_middle",
    "bb_lower",
];

pub fn parse(doc: &Value) -> Result<FilterExpression, ValidationErrors> {
    let mut validator = Validator::default();
    let expr = validator.filter(doc);
    match (expr, validator.errors.is_empty()) {
        (Some(expr), true) => Ok(expr),
        _ => {
            if validator.errors.is_empty() {
                validator.schema("", "invalid filter");
            }
            Err(ValidationErrors(validator.errors))
        }
    }
}

/// Parse a filter from JSON text. Malformed JSON is reported as a violation at
/// the document root.
pub fn parse_str(input: &str) -> Result<FilterExpression, ValidationErrors> {
    let doc: Value = serde_json::from_str(input).map_err(|e| {
        ValidationErrors::single(ValidationError::schema("", format!("invalid JSON: {e}")))
    })?;
    parse(&doc)
}

fn pointer(parent: &str, token: &str) -> String {
    let escaped = token.replace('~', "~0").replace('/', "~1");
    format!("{parent}/{escaped}")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    fn schema(&mut self, path: &str, reason: impl Into<String>) {
        self.errors.push(ValidationError::schema(path, reason));
    }

    fn arity(&mut self, path: &str, reason: impl Into<String>) {
        self.errors.push(ValidationError::arity(path, reason));
    }

    fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.schema(path, format!("must be an object, found {}", type_name(other)));
                None
            }
        }
    }

    fn reject_unknown_keys(&mut self, map: &Map<String, Value>, allowed: &[&str], path: &str) {
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                self.schema(&pointer(path, key), "unexpected key");
            }
        }
    }

    fn required<'v>(
        &mut self,
        map: &'v Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'v Value> {
        let value = map.get(key);
        if value.is_none() {
            self.schema(&pointer(path, key), "is required");
        }
        value
    }

    fn string<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v str> {
        match value {
            Value::String(s) => Some(s),
            other => {
                self.schema(path, format!("must be a string, found {}", type_name(other)));
                None
            }
        }
    }

    fn filter(&mut self, doc: &Value) -> Option<FilterExpression> {
        let map = self.object(doc, "")?;
        self.reject_unknown_keys(map, &TOP_LEVEL_KEYS, "");

        let logic = self.required(map, "logic", "").and_then(|v| self.logic(v));
        let conditions = self
            .required(map, "conditions", "")
            .and_then(|v| self.conditions(v));

        let expr = FilterExpression::new(logic?, conditions?);
        match expr {
            Ok(expr) => Some(expr),
            Err(errors) => {
                self.errors.extend(errors.0);
                None
            }
        }
    }

    fn logic(&mut self, value: &Value) -> Option<Logic> {
        let s = self.string(value, "/logic")?;
        let logic = Logic::from_name(s);
        if logic.is_none() {
            self.schema("/logic", format!("must be \"AND\" or \"OR\", found \"{s}\""));
        }
        logic
    }

    fn conditions(&mut self, value: &Value) -> Option<Vec<Condition>> {
        let Value::Array(items) = value else {
            self.schema(
                "/conditions",
                format!("must be an array, found {}", type_name(value)),
            );
            return None;
        };
        let count_ok = !items.is_empty() && items.len() <= MAX_CONDITIONS;
        if !count_ok {
            self.schema(
                "/conditions",
                format!(
                    "must contain between 1 and {MAX_CONDITIONS} conditions, found {}",
                    items.len()
                ),
            );
        }

        let mut parsed = Vec::with_capacity(items.len());
        let mut complete = true;
        for (i, item) in items.iter().enumerate() {
            match self.condition(item, &format!("/conditions/{i}")) {
                Some(c) => parsed.push(c),
                None => complete = false,
            }
        }
        (complete && count_ok).then_some(parsed)
    }

    fn condition(&mut self, value: &Value, path: &str) -> Option<Condition> {
        let map = self.object(value, path)?;
        self.reject_unknown_keys(map, &CONDITION_KEYS, path);

        let left = self
            .required(map, "left", path)
            .and_then(|v| self.operand(v, &pointer(path, "left")));
        let operator = self
            .required(map, "operator", path)
            .and_then(|v| self.operator(v, &pointer(path, "operator")));
        let right = self
            .required(map, "right", path)
            .and_then(|v| self.operand(v, &pointer(path, "right")));

        Some(Condition::new(left?, operator?, right?))
    }

    fn operator(&mut self, value: &Value, path: &str) -> Option<Operator> {
        let s = self.string(value, path)?;
        let op = Operator::from_symbol(s);
        if op.is_none() {
            self.schema(
                path,
                format!("must be one of >, <, >=, <=, ==, !=, found \"{s}\""),
            );
        }
        op
    }

    fn operand(&mut self, value: &Value, path: &str) -> Option<Operand> {
        let map = self.object(value, path)?;
        let type_path = pointer(path, "type");
        let kind = self.required(map, "type", path)?;
        let kind = self.string(kind, &type_path)?;

        match kind {
            "column" => {
                self.reject_unknown_keys(map, &COLUMN_KEYS, path);
                self.column_operand(map, path)
            }
            "indicator" => {
                self.reject_unknown_keys(map, &INDICATOR_KEYS, path);
                self.indicator_operand(map, path)
            }
            "constant" => {
                self.reject_unknown_keys(map, &CONSTANT_KEYS, path);
                self.constant_operand(map, path)
            }
            other => {
                self.schema(
                    &type_path,
                    format!("must be one of column, indicator, constant, found \"{other}\""),
                );
                None
            }
        }
    }

    fn column_operand(&mut self, map: &Map<String, Value>, path: &str) -> Option<Operand> {
        let name = self
            .required(map, "name", path)
            .and_then(|v| self.column_name(v, &pointer(path, "name")));
        let timeframe = self.timeframe(map, path);
        let offset = self.offset(map, path);

        Some(Operand::Column(ColumnRef {
            name: name?,
            timeframe: timeframe?,
            offset: offset?,
        }))
    }

    fn indicator_operand(&mut self, map: &Map<String, Value>, path: &str) -> Option<Operand> {
        let name_path = pointer(path, "name");
        let name = self
            .required(map, "name", path)
            .and_then(|v| self.string(v, &name_path));
        let indicator = name.and_then(|name| self.indicator(name, map.get("params"), path));
        let column = self
            .required(map, "column", path)
            .and_then(|v| self.column_name(v, &pointer(path, "column")));
        let timeframe = self.timeframe(map, path);
        let offset = self.offset(map, path);

        Some(Operand::Indicator(IndicatorOperand {
            indicator: indicator?,
            column: column?,
            timeframe: timeframe?,
            offset: offset?,
        }))
    }

    fn constant_operand(&mut self, map: &Map<String, Value>, path: &str) -> Option<Operand> {
        let value_path = pointer(path, "value");
        let value = self.required(map, "value", path)?;
        match value.as_f64() {
            Some(v) if v.is_finite() => Some(Operand::Constant(v)),
            Some(_) => {
                self.schema(&value_path, "must be a finite number");
                None
            }
            None => {
                self.schema(
                    &value_path,
                    format!("must be a number, found {}", type_name(value)),
                );
                None
            }
        }
    }

    /// Column names are matched case-insensitively against row columns.
    fn column_name(&mut self, value: &Value, path: &str) -> Option<String> {
        let s = self.string(value, path)?.trim();
        if s.is_empty() {
            self.schema(path, "must not be empty");
            return None;
        }
        Some(s.to_ascii_lowercase())
    }

    fn timeframe(&mut self, map: &Map<String, Value>, path: &str) -> Option<Timeframe> {
        let Some(value) = map.get("timeframe") else {
            return Some(Timeframe::default());
        };
        let tf_path = pointer(path, "timeframe");
        let s = self.string(value, &tf_path)?;
        match s {
            "daily" => Some(Timeframe::Daily),
            "weekly" => Some(Timeframe::Weekly),
            "intraday" => Some(Timeframe::Intraday),
            other => {
                self.schema(
                    &tf_path,
                    format!("must be one of daily, weekly, intraday, found \"{other}\""),
                );
                None
            }
        }
    }

    fn offset(&mut self, map: &Map<String, Value>, path: &str) -> Option<usize> {
        let Some(value) = map.get("offset") else {
            return Some(0);
        };
        let offset_path = pointer(path, "offset");
        if let Some(n) = value.as_u64() {
            return match usize::try_from(n) {
                Ok(n) if n <= MAX_OFFSET => Some(n),
                _ => {
                    self.schema(
                        &offset_path,
                        format!("must be at most {MAX_OFFSET}, found {n}"),
                    );
                    None
                }
            };
        }
        if value.as_i64().is_some() {
            self.schema(
                &offset_path,
                "must be a non-negative integer; negative offsets would look ahead",
            );
        } else {
            self.schema(
                &offset_path,
                format!("must be a non-negative integer, found {}", type_name(value)),
            );
        }
        None
    }

    fn indicator(
        &mut self,
        name: &str,
        params: Option<&Value>,
        path: &str,
    ) -> Option<IndicatorRef> {
        if !INDICATOR_NAMES.contains(&name) {
            self.schema(
                &pointer(path, "name"),
                format!("unknown indicator \"{name}\""),
            );
            return None;
        }

        let params_path = pointer(path, "params");
        let params: Vec<&Value> = match params {
            None => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(other) => {
                self.schema(
                    &params_path,
                    format!("must be an array, found {}", type_name(other)),
                );
                return None;
            }
        };
        let defaulted = params.is_empty();

        match name {
            "sma" | "ema" | "wma" | "rsi" | "roc" | "stddev" => {
                let period = if defaulted {
                    default_period(name)
                } else {
                    self.expect_len(&params, 1, name, &params_path)?;
                    self.period(params[0], &pointer(&params_path, "0"))?
                };
                let indicator_type = match name {
                    "sma" => IndicatorType::Sma(period),
                    "ema" => IndicatorType::Ema(period),
                    "wma" => IndicatorType::Wma(period),
                    "rsi" => IndicatorType::Rsi(period),
                    "roc" => IndicatorType::Roc(period),
                    _ => IndicatorType::Stddev(period),
                };
                Some(IndicatorRef::new(indicator_type, IndicatorField::Value))
            }
            "macd" | "macd_signal" | "macd_hist" => {
                let (fast, slow, signal) = if defaulted {
                    (macd::DEFAULT_FAST, macd::DEFAULT_SLOW, macd::DEFAULT_SIGNAL)
                } else {
                    self.expect_len(&params, 3, name, &params_path)?;
                    let fast = self.period(params[0], &pointer(&params_path, "0"));
                    let slow = self.period(params[1], &pointer(&params_path, "1"));
                    let signal = self.period(params[2], &pointer(&params_path, "2"));
                    (fast?, slow?, signal?)
                };
                if fast >= slow {
                    self.arity(
                        &params_path,
                        format!("fast period ({fast}) must be less than slow period ({slow})"),
                    );
                    return None;
                }
                let field = match name {
                    "macd" => IndicatorField::MacdLine,
                    "macd_signal" => IndicatorField::MacdSignal,
                    _ => IndicatorField::MacdHistogram,
                };
                Some(IndicatorRef::new(
                    IndicatorType::Macd { fast, slow, signal },
                    field,
                ))
            }
            _ => {
                let (period, stddev_mult_x100) = if defaulted {
                    (bollinger::DEFAULT_PERIOD, bollinger::DEFAULT_MULT_X100)
                } else {
                    self.expect_len(&params, 2, name, &params_path)?;
                    let period = self.period(params[0], &pointer(&params_path, "0"));
                    let mult = self.multiplier(params[1], &pointer(&params_path, "1"));
                    (period?, mult?)
                };
                let field = match name {
                    "bb_upper" => IndicatorField::BollingerUpper,
                    "bb_lower" => IndicatorField::BollingerLower,
                    _ => IndicatorField::BollingerMiddle,
                };
                Some(IndicatorRef::new(
                    IndicatorType::Bollinger {
                        period,
                        stddev_mult_x100,
                    },
                    field,
                ))
            }
        }
    }

    fn expect_len(
        &mut self,
        params: &[&Value],
        expected: usize,
        name: &str,
        path: &str,
    ) -> Option<()> {
        if params.len() == expected {
            return Some(());
        }
        self.arity(
            path,
            format!(
                "{name} takes {expected} parameter{}, found {}",
                if expected == 1 { "" } else { "s" },
                params.len()
            ),
        );
        None
    }

    fn period(&mut self, value: &Value, path: &str) -> Option<usize> {
        let period = value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                .map(|f| f as u64)
        });
        match period.map(usize::try_from) {
            Some(Ok(p)) if (1..=MAX_PERIOD).contains(&p) => Some(p),
            Some(_) if period != Some(0) => {
                self.arity(path, format!("must be at most {MAX_PERIOD}, found {value}"));
                None
            }
            _ => {
                self.arity(path, format!("must be a positive integer, found {value}"));
                None
            }
        }
    }

    fn multiplier(&mut self, value: &Value, path: &str) -> Option<u32> {
        let Some(mult) = value
            .as_f64()
            .filter(|f| f.is_finite() && *f > 0.0 && *f <= u32::MAX as f64 / 100.0)
        else {
            self.arity(
                path,
                format!("must be a positive number of at least 0.01, found {value}"),
            );
            return None;
        };
        let scaled = mult * 100.0;
        let x100 = scaled.round();
        if x100 < 1.0 || (scaled - x100).abs() > 1e-6 {
            self.arity(
                path,
                format!("must be a multiple of 0.01 of at least 0.01, found {value}"),
            );
            return None;
        }
        Some(x100 as u32)
    }
}

fn default_period(name: &str) -> usize {
    match name {
        "rsi" => rsi::DEFAULT_PERIOD,
        "roc" => roc::DEFAULT_PERIOD,
        _ => 20,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ViolationKind;
    use serde_json::json;

    fn close_above(value: f64) -> Value {
        json!({
            "left": {"type": "column", "name": "close"},
            "operator": ">",
            "right": {"type": "constant", "value": value}
        })
    }

    fn errors_of(doc: Value) -> ValidationErrors {
        parse(&doc).expect_err("document should be rejected")
    }

    #[test]
    fn minimal_filter_parses_with_defaults() {
        let expr = parse(&json!({"logic": "AND", "conditions": [close_above(100.0)]})).unwrap();
        assert_eq!(expr.logic(), Logic::And);
        assert_eq!(expr.conditions().len(), 1);
        match &expr.conditions()[0].left {
            Operand::Column(c) => {
                assert_eq!(c.name, "close");
                assert_eq!(c.timeframe, Timeframe::Daily);
                assert_eq!(c.offset, 0);
            }
            other => panic!("expected column operand, got {other:?}"),
        }
    }

    #[test]
    fn missing_required_keys_are_reported_at_their_paths() {
        let errors = errors_of(json!({}));
        assert!(errors.has_path("/logic"));
        assert!(errors.has_path("/conditions"));

        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{"left": {"type": "column", "name": "close"}, "operator": ">"}]
        }));
        assert!(errors.has_path("/conditions/0/right"));
    }

    #[test]
    fn every_violation_is_collected() {
        let errors = errors_of(json!({
            "logic": "XOR",
            "extra": true,
            "conditions": [
                {
                    "left": {"type": "column", "name": "close", "offset": -1},
                    "operator": "=>",
                    "right": {"type": "constant", "value": "ten"}
                },
                {
                    "left": {"type": "indicator", "name": "sma", "params": [20]},
                    "operator": "<",
                    "right": {"type": "bogus"}
                }
            ]
        }));
        for path in [
            "/logic",
            "/extra",
            "/conditions/0/left/offset",
            "/conditions/0/operator",
            "/conditions/0/right/value",
            "/conditions/1/left/column",
            "/conditions/1/right/type",
        ] {
            assert!(errors.has_path(path), "missing violation at {path}: {errors}");
        }
        assert_eq!(errors.len(), 7);
    }

    #[test]
    fn condition_count_bounds() {
        let errors = errors_of(json!({"logic": "OR", "conditions": []}));
        assert!(errors.has_path("/conditions"));

        let many: Vec<Value> = (0..51).map(|i| close_above(i as f64)).collect();
        let errors = errors_of(json!({"logic": "OR", "conditions": many}));
        assert_eq!(errors.len(), 1);
        assert!(errors.has_path("/conditions"));

        let fifty: Vec<Value> = (0..50).map(|i| close_above(i as f64)).collect();
        assert!(parse(&json!({"logic": "OR", "conditions": fifty})).is_ok());
    }

    #[test]
    fn foreign_keys_on_operand_variant_rejected() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "constant", "value": 1, "offset": 2},
                "operator": "<",
                "right": {"type": "column", "name": "close", "params": [3]}
            }]
        }));
        assert!(errors.has_path("/conditions/0/left/offset"));
        assert!(errors.has_path("/conditions/0/right/params"));
    }

    #[test]
    fn unexpected_key_paths_are_escaped() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [close_above(1.0)],
            "a/b~c": 1
        }));
        assert!(errors.has_path("/a~1b~0c"));
    }

    #[test]
    fn arity_violations_are_tagged() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "macd", "params": [12, 26], "column": "close"},
                "operator": ">",
                "right": {"type": "indicator", "name": "sma", "params": [0], "column": "close"}
            }]
        }));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ViolationKind::Arity));
        assert!(errors.has_path("/conditions/0/left/params"));
        assert!(errors.has_path("/conditions/0/right/params/0"));
    }

    #[test]
    fn macd_fast_must_be_below_slow() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "macd_hist", "params": [26, 12, 9], "column": "close"},
                "operator": ">",
                "right": {"type": "constant", "value": 0}
            }]
        }));
        assert_eq!(errors.0[0].kind, ViolationKind::Arity);
    }

    #[test]
    fn unknown_indicator_is_a_schema_violation() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "vwap", "column": "close"},
                "operator": ">",
                "right": {"type": "constant", "value": 0}
            }]
        }));
        assert_eq!(errors.0[0].kind, ViolationKind::Schema);
        assert!(errors.has_path("/conditions/0/left/name"));
    }

    #[test]
    fn indicator_params_default_when_omitted() {
        let expr = parse(&json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "rsi", "column": "close"},
                "operator": "<",
                "right": {"type": "indicator", "name": "bb_lower", "column": "close", "params": [10, 1.5]}
            }]
        }))
        .unwrap();
        let cond = &expr.conditions()[0];
        match (&cond.left, &cond.right) {
            (Operand::Indicator(l), Operand::Indicator(r)) => {
                assert_eq!(l.indicator.indicator_type, IndicatorType::Rsi(14));
                assert_eq!(
                    r.indicator.indicator_type,
                    IndicatorType::Bollinger {
                        period: 10,
                        stddev_mult_x100: 150
                    }
                );
                assert_eq!(r.indicator.field, IndicatorField::BollingerLower);
            }
            other => panic!("expected indicator operands, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_or_non_numeric_constant_rejected() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "constant"},
                "operator": "==",
                "right": {"type": "constant", "value": null}
            }]
        }));
        assert!(errors.has_path("/conditions/0/left/value"));
        assert!(errors.has_path("/conditions/0/right/value"));
    }

    #[test]
    fn bad_timeframe_rejected() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "column", "name": "close", "timeframe": "monthly"},
                "operator": ">",
                "right": {"type": "constant", "value": 1}
            }]
        }));
        assert!(errors.has_path("/conditions/0/left/timeframe"));
    }

    #[test]
    fn fractional_offset_rejected() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "column", "name": "close", "offset": 1.5},
                "operator": ">",
                "right": {"type": "constant", "value": 1}
            }]
        }));
        assert!(errors.has_path("/conditions/0/left/offset"));
    }

    #[test]
    fn huge_offset_rejected() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "column", "name": "close", "offset": u64::MAX},
                "operator": ">",
                "right": {"type": "indicator", "name": "sma", "column": "close", "offset": MAX_OFFSET + 1}
            }]
        }));
        assert!(errors.has_path("/conditions/0/left/offset"));
        assert!(errors.has_path("/conditions/0/right/offset"));
    }

    #[test]
    fn huge_period_rejected() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "rsi", "params": [u64::MAX], "column": "close"},
                "operator": ">",
                "right": {"type": "indicator", "name": "macd", "params": [12, 26, MAX_PERIOD + 1], "column": "close"}
            }]
        }));
        assert!(errors.has_path("/conditions/0/left/params/0"));
        assert!(errors.has_path("/conditions/0/right/params/2"));
        assert!(errors.iter().all(|e| e.kind == ViolationKind::Arity));
    }

    #[test]
    fn largest_offset_and_period_keep_a_finite_window() {
        let expr = parse(&json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "rsi", "params": [MAX_PERIOD], "column": "close", "offset": MAX_OFFSET},
                "operator": ">",
                "right": {"type": "indicator", "name": "macd_hist", "params": [1, MAX_PERIOD - 1, MAX_PERIOD], "column": "close"}
            }]
        }))
        .unwrap();
        assert_eq!(expr.lookback_window(), MAX_OFFSET + MAX_PERIOD + 1);
    }

    #[test]
    fn bollinger_multiplier_must_be_whole_hundredths() {
        let errors = errors_of(json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "bb_upper", "params": [20, 2.257], "column": "close"},
                "operator": ">",
                "right": {"type": "indicator", "name": "bb_lower", "params": [20, 0.001], "column": "close"}
            }]
        }));
        assert!(errors.has_path("/conditions/0/left/params/1"));
        assert!(errors.has_path("/conditions/0/right/params/1"));

        let expr = parse(&json!({
            "logic": "AND",
            "conditions": [{
                "left": {"type": "indicator", "name": "bb_upper", "params": [20, 0.1], "column": "close"},
                "operator": ">",
                "right": {"type": "constant", "value": 0}
            }]
        }))
        .unwrap();
        match &expr.conditions()[0].left {
            Operand::Indicator(i) => assert_eq!(
                i.indicator.indicator_type,
                IndicatorType::Bollinger {
                    period: 20,
                    stddev_mult_x100: 10
                }
            ),
            other => panic!("expected indicator operand, got {other:?}"),
        }
    }

    #[test]
    fn serialized_expression_reparses_equal() {
        let doc = json!({
            "logic": "OR",
            "conditions": [
                {
                    "left": {"type": "indicator", "name": "macd_signal", "column": "Close", "timeframe": "weekly", "offset": 1},
                    "operator": "!=",
                    "right": {"type": "indicator", "name": "bb_upper", "params": [20, 2.25], "column": "close"}
                },
                {
                    "left": {"type": "column", "name": "volume", "offset": 3},
                    "operator": "<=",
                    "right": {"type": "constant", "value": 1.5e6}
                }
            ]
        });
        let expr = parse(&doc).unwrap();
        let reparsed = parse(&expr.to_json()).unwrap();
        assert_eq!(expr, reparsed);
        assert_eq!(expr.to_json_string(), reparsed.to_json_string());
    }

    #[test]
    fn malformed_json_text() {
        let errors = parse_str("{\"logic\": ").unwrap_err();
        assert!(errors.has_path(""));
    }
}
