//! Integer, float, and decimal handlers: build-time consolidation of `Value` bound
//! constraints into a single effective lower and upper bound.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde_json::{Number, Value};

use crate::config::{HandleConfig, Shape};
use crate::constraints::{Comparator, Constraint, ConstraintId, Constraints, DataType};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, BuildOnce, Handler, HandlerOutput};
use crate::handlers::scalar::json_data_type;
use crate::issue::{Issue, IssueKind};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::types::TypeExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Int,
    Float,
    Decimal,
}

struct Bounds {
    lower: Option<(Comparator, f64)>,
    upper: Option<(Comparator, f64)>,
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn consolidate(constraints: &Constraints) -> Bounds {
    let mut lower: Option<(Comparator, f64)> = None;
    let mut upper: Option<(Comparator, f64)> = None;
    for comparator in [Comparator::Ge, Comparator::Gt] {
        if let Some(Constraint::Value { comparator, limit }) =
            constraints.get(ConstraintId::Value(comparator))
        {
            if let Some(v) = as_f64(limit) {
                lower = Some(match lower {
                    Some((_, existing)) if existing >= v => lower.unwrap(),
                    _ => (*comparator, v),
                });
            }
        }
    }
    for comparator in [Comparator::Le, Comparator::Lt] {
        if let Some(Constraint::Value { comparator, limit }) =
            constraints.get(ConstraintId::Value(comparator))
        {
            if let Some(v) = as_f64(limit) {
                upper = Some(match upper {
                    Some((_, existing)) if existing <= v => upper.unwrap(),
                    _ => (*comparator, v),
                });
            }
        }
    }
    Bounds { lower, upper }
}

fn check_bounds(bounds: &Bounds, actual: f64, pointer: &Pointer) -> Vec<Issue> {
    let mut issues = Vec::new();
    if let Some((comparator, limit)) = bounds.lower {
        let ok = match comparator {
            Comparator::Ge => actual >= limit,
            Comparator::Gt => actual > limit,
            _ => true,
        };
        if !ok {
            issues.push(Issue::new(
                pointer.clone(),
                IssueKind::Number { comparator, limit: limit.to_string() },
            ));
        }
    }
    if let Some((comparator, limit)) = bounds.upper {
        let ok = match comparator {
            Comparator::Le => actual <= limit,
            Comparator::Lt => actual < limit,
            _ => true,
        };
        if !ok {
            issues.push(Issue::new(
                pointer.clone(),
                IssueKind::Number { comparator, limit: limit.to_string() },
            ));
        }
    }
    issues
}

pub struct NumberHandler {
    kind: NumberKind,
    constraints: Constraints,
    bounds: BuildOnce<Bounds>,
}

impl NumberHandler {
    pub fn new(kind: NumberKind, constraints: Constraints) -> NumberHandler {
        NumberHandler {
            kind,
            constraints,
            bounds: BuildOnce::new(),
        }
    }

    fn expected_data_type(&self) -> DataType {
        match self.kind {
            NumberKind::Int => DataType::Integer,
            NumberKind::Float | NumberKind::Decimal => DataType::Number,
        }
    }
}

impl Handler for NumberHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        self.bounds
            .get_or_try_init(|| Ok(consolidate(&self.constraints)))?;
        Ok(())
    }

    fn handle(
        &self,
        value: &Value,
        pointer: &Pointer,
        included: bool,
        excluded: bool,
        config: &HandleConfig,
    ) -> (HandlerOutput, Vec<Issue>) {
        if let Some(result) = short_circuit(included, excluded) {
            return result;
        }
        let bounds = match self.bounds.get_or_try_init(|| Ok(consolidate(&self.constraints))) {
            Ok(b) => b,
            Err(_) => unreachable!("consolidate never fails"),
        };

        // Int/Float digit-string coercion has no source gate; Decimal only coerces a
        // string when source != json (it destructures to a JSON string itself, so a
        // json-source string is left for the handler's own type check to reject).
        let numeric: Option<f64> = match (self.kind, value) {
            (_, Value::Number(n)) => n.as_f64(),
            (NumberKind::Decimal, Value::String(s)) if config.coerce && config.source != Shape::Json => {
                s.parse::<f64>().ok()
            }
            (NumberKind::Decimal, _) => None,
            (_, Value::String(s)) if config.coerce => s.parse::<f64>().ok(),
            _ => None,
        };

        let Some(numeric) = numeric else {
            return (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::JsonType {
                        expected: self.expected_data_type(),
                        actual: json_data_type(value),
                    },
                )],
            );
        };

        if self.kind == NumberKind::Int && numeric.fract() != 0.0 {
            return (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::JsonType {
                        expected: DataType::Integer,
                        actual: DataType::Number,
                    },
                )],
            );
        }

        let issues = check_bounds(bounds, numeric, pointer);
        if !issues.is_empty() {
            return (HandlerOutput::Empty, issues);
        }

        let output = match self.kind {
            NumberKind::Int => Value::Number(Number::from(numeric as i64)),
            NumberKind::Float => Value::Number(Number::from_f64(numeric).unwrap_or_else(|| Number::from(0))),
            NumberKind::Decimal => {
                if config.target == Shape::Json {
                    Value::Number(Number::from_f64(numeric).unwrap_or_else(|| Number::from(0)))
                } else {
                    Value::String(
                        BigDecimal::from_str(&numeric.to_string())
                            .map(|d| d.to_string())
                            .unwrap_or_else(|_| numeric.to_string()),
                    )
                }
            }
        };
        (HandlerOutput::Value(output), Vec::new())
    }
}

pub struct NumberFactory(pub NumberKind);

impl HandlerFactory for NumberFactory {
    fn build_handler(
        &self,
        _type_expr: &TypeExpr,
        constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let handler = NumberHandler::new(self.0, constraints.clone());
        handler.build()?;
        Ok(Arc::new(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidates_to_tightest_bound() {
        let mut constraints = Constraints::empty();
        constraints.insert(Constraint::Value { comparator: Comparator::Ge, limit: Value::from(0) });
        constraints.insert(Constraint::Value { comparator: Comparator::Gt, limit: Value::from(-5) });
        let bounds = consolidate(&constraints);
        // Ge(0) is tighter than Gt(-5) at the boundary value 0.
        assert_eq!(bounds.lower, Some((Comparator::Ge, 0.0)));
    }

    #[test]
    fn rejects_out_of_range_value() {
        let mut constraints = Constraints::empty();
        constraints.insert(Constraint::Value { comparator: Comparator::Ge, limit: Value::from(5) });
        let handler = NumberHandler::new(NumberKind::Int, constraints);
        handler.build().unwrap();
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (_, issues) = handler.handle(&Value::from(2), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn coerces_digit_string_when_requested() {
        let handler = NumberHandler::new(NumberKind::Int, Constraints::empty());
        handler.build().unwrap();
        let mut config = HandleConfig::for_test(Shape::Json, Shape::Json);
        config.coerce = true;
        let (out, issues) = handler.handle(&Value::from("7"), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from(7)));
    }
}
