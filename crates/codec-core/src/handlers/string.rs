//! The string handler and its format specializations (datetime, date, time,
//! duration, IP, UUID, email, URL, regex pattern, filesystem path).
//!
//! All of these share one build/runtime skeleton: consolidate length bounds,
//! compile the (at most one) pattern constraint, fix an encoder/decoder pair if
//! `Encoding` is set, and run a format-specific parse check if `Format` is set.
//! They differ only in which format function `build()` selects, so rather than
//! one struct per format (as the handler-per-canonical-type list in the design
//! doc enumerates) this is a single [`StringHandler`] parameterized by an
//! optional [`Format`].

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use time::format_description::well_known::Iso8601;
use time::{Date, OffsetDateTime, Time};

use crate::config::{HandleConfig, Shape};
use crate::constraints::{Comparator, Constraint, ConstraintId, Constraints, DataType, Encoding, Format};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, BuildOnce, Handler, HandlerOutput};
use crate::handlers::length::{self, LengthBounds};
use crate::handlers::scalar::json_data_type;
use crate::issue::{Issue, IssueKind};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::types::TypeExpr;

/// A strict ISO-8601 duration subset: `±PnDTnHnMn[.fff]S`. Exposed standalone
/// because both the string handler and its tests need it.
pub fn parse_duration_seconds(input: &str) -> Option<f64> {
    let (sign, rest) = match input.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, input),
    };
    let rest = rest.strip_prefix('P')?;
    let (days_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };
    let mut total = 0.0f64;
    if !days_part.is_empty() {
        let digits = days_part.strip_suffix('D')?;
        total += digits.parse::<f64>().ok()? * 86_400.0;
    }
    if let Some(time_part) = time_part {
        let mut remainder = time_part;
        if let Some((hours, rest)) = remainder.split_once('H') {
            total += hours.parse::<f64>().ok()? * 3_600.0;
            remainder = rest;
        }
        if let Some((minutes, rest)) = remainder.split_once('M') {
            total += minutes.parse::<f64>().ok()? * 60.0;
            remainder = rest;
        }
        if let Some(seconds) = remainder.strip_suffix('S') {
            if !seconds.is_empty() {
                total += seconds.parse::<f64>().ok()?;
            }
        } else if !remainder.is_empty() {
            return None;
        }
    }
    Some(sign * total)
}

pub fn format_duration_seconds(total_seconds: f64) -> String {
    let sign = if total_seconds < 0.0 { "-" } else { "" };
    let mut remaining = total_seconds.abs();
    let days = (remaining / 86_400.0).floor();
    remaining -= days * 86_400.0;
    let hours = (remaining / 3_600.0).floor();
    remaining -= hours * 3_600.0;
    let minutes = (remaining / 60.0).floor();
    remaining -= minutes * 60.0;
    let mut out = format!("{sign}P");
    if days > 0.0 {
        out.push_str(&format!("{}D", days as i64));
    }
    out.push('T');
    if hours > 0.0 {
        out.push_str(&format!("{}H", hours as i64));
    }
    if minutes > 0.0 {
        out.push_str(&format!("{}M", minutes as i64));
    }
    if remaining.fract() == 0.0 {
        out.push_str(&format!("{}S", remaining as i64));
    } else {
        out.push_str(&format!("{remaining:.3}S"));
    }
    out
}

fn check_format(format: Format, value: &str) -> bool {
    match format {
        Format::DateTime => OffsetDateTime::parse(value, &Iso8601::DEFAULT).is_ok(),
        Format::Date => Date::parse(value, &time::macros::format_description!("[year]-[month]-[day]")).is_ok(),
        Format::Time => Time::parse(value, &time::macros::format_description!("[hour]:[minute]:[second]")).is_ok(),
        Format::Duration => parse_duration_seconds(value).is_some(),
        Format::Ipv4 => value.parse::<std::net::Ipv4Addr>().is_ok(),
        Format::Ipv6 => value.parse::<std::net::Ipv6Addr>().is_ok(),
        Format::Uuid => uuid::Uuid::parse_str(value).is_ok(),
        Format::Email => email_regex().is_match(value),
        Format::Url => url::Url::parse(value).is_ok(),
        Format::Regex => Regex::new(value).is_ok(),
        Format::Path => true,
        Format::Int32 | Format::Int64 => true,
    }
}

fn email_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn decode_bytes(encoding: Encoding, value: &str) -> Result<Vec<u8>, ()> {
    use base64::Engine;
    match encoding {
        Encoding::Base64 => base64::engine::general_purpose::STANDARD.decode(value).map_err(|_| ()),
        Encoding::Base16 => {
            if value.len() % 2 != 0 {
                return Err(());
            }
            (0..value.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&value[i..i + 2], 16).map_err(|_| ()))
                .collect()
        }
        Encoding::Base32 => data_encoding::BASE32.decode(value.as_bytes()).map_err(|_| ()),
        Encoding::Base32Hex => data_encoding::BASE32HEX.decode(value.as_bytes()).map_err(|_| ()),
    }
}

struct Built {
    length: LengthBounds,
    pattern: Option<Regex>,
}

pub struct StringHandler {
    constraints: Constraints,
    format: Option<Format>,
    encoding: Option<Encoding>,
    built: BuildOnce<Built>,
}

impl StringHandler {
    pub fn new(constraints: Constraints) -> StringHandler {
        let format = match constraints.get(ConstraintId::Format) {
            Some(Constraint::Format(format)) => Some(*format),
            _ => None,
        };
        let encoding = match constraints.get(ConstraintId::Encoding) {
            Some(Constraint::Encoding(encoding)) => Some(*encoding),
            _ => None,
        };
        StringHandler { constraints, format, encoding, built: BuildOnce::new() }
    }

    fn build_inner(&self) -> Result<Built, ProtocolError> {
        let pattern = match self.constraints.get(ConstraintId::Pattern) {
            Some(Constraint::Pattern(pattern)) => Some(
                Regex::new(pattern).map_err(|_| ProtocolError::UnsupportedEncoding {
                    encoding: format!("pattern {pattern:?}"),
                })?,
            ),
            _ => None,
        };
        Ok(Built { length: length::consolidate(&self.constraints), pattern })
    }
}

impl Handler for StringHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        self.built.get_or_try_init(|| self.build_inner())?;
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
        let built = match self.built.get_or_try_init(|| self.build_inner()) {
            Ok(b) => b,
            Err(_) => unreachable!("build() must run before handle()"),
        };

        let text = match value {
            Value::String(s) => s.clone(),
            other => {
                return (
                    HandlerOutput::Empty,
                    vec![Issue::new(
                        pointer.clone(),
                        IssueKind::JsonType { expected: DataType::String, actual: json_data_type(other) },
                    )],
                );
            }
        };

        let mut issues = length::check(&built.length, text.chars().count(), pointer);
        if let Some(pattern) = &built.pattern {
            if !pattern.is_match(&text) {
                issues.push(Issue::new(
                    pointer.clone(),
                    IssueKind::Pattern { pattern: pattern.as_str().to_string(), value: text.clone() },
                ));
            }
        }
        if !issues.is_empty() {
            return (HandlerOutput::Empty, issues);
        }

        if let Some(encoding) = self.encoding {
            if decode_bytes(encoding, &text).is_err() {
                return (
                    HandlerOutput::Empty,
                    vec![Issue::new(pointer.clone(), IssueKind::Decoding { encoding })],
                );
            }
        }

        if let Some(format) = self.format {
            if !check_format(format, &text) {
                return (HandlerOutput::Empty, vec![Issue::new(pointer.clone(), IssueKind::Format { format })]);
            }
        }

        let _ = config;
        (HandlerOutput::Value(Value::String(text)), Vec::new())
    }
}

pub struct StringFactory;

impl HandlerFactory for StringFactory {
    fn build_handler(
        &self,
        _type_expr: &TypeExpr,
        constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let handler = StringHandler::new(constraints.clone());
        handler.build()?;
        Ok(Arc::new(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shape;

    #[test]
    fn rejects_non_string() {
        let handler = StringHandler::new(Constraints::empty());
        handler.build().unwrap();
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (_, issues) = handler.handle(&Value::from(1), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn length_bounds_consolidate_to_tightest() {
        let mut constraints = Constraints::empty();
        constraints.insert(Constraint::Length { comparator: Comparator::Ge, limit: 3 });
        constraints.insert(Constraint::Length { comparator: Comparator::Ge, limit: 5 });
        constraints.insert(Constraint::Length { comparator: Comparator::Le, limit: 10 });
        constraints.insert(Constraint::Length { comparator: Comparator::Le, limit: 8 });
        let handler = StringHandler::new(constraints);
        handler.build().unwrap();
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (_, issues) = handler.handle(&Value::from("ab"), &Pointer::root(), true, false, &config);
        assert_eq!(
            issues,
            vec![Issue::new(
                Pointer::root(),
                IssueKind::Length { comparator: Comparator::Ge, limit: 5, actual: 2 }
            )]
        );
        let (_, issues) = handler.handle(&Value::from("abcdef"), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
    }

    #[test]
    fn uuid_format_rejects_malformed() {
        let mut constraints = Constraints::empty();
        constraints.insert(Constraint::Format(Format::Uuid));
        let handler = StringHandler::new(constraints);
        handler.build().unwrap();
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (_, issues) = handler.handle(&Value::from("not-a-uuid"), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
        let (_, issues) =
            handler.handle(&Value::from("123e4567-e89b-12d3-a456-426614174000"), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
    }

    #[test]
    fn duration_roundtrip() {
        let seconds = parse_duration_seconds("P1DT2H3M4.5S").unwrap();
        assert_eq!(seconds, 86_400.0 + 7_200.0 + 180.0 + 4.5);
        assert_eq!(format_duration_seconds(4.5), "PT4.500S");
    }

    #[test]
    fn base64_encoding_validated_not_decoded_into_output() {
        let mut constraints = Constraints::empty();
        constraints.insert(Constraint::Encoding(Encoding::Base64));
        let handler = StringHandler::new(constraints);
        handler.build().unwrap();
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (out, issues) = handler.handle(&Value::from("aGk="), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from("aGk=")));
        let (_, issues) = handler.handle(&Value::from("not base64!"), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }
}
