//! Decodes YAML text into JSON data. Plain scalars are resolved with
//! the YAML 1.1 rules configuration files are commonly written for:
//! `yes`/`no`/`on`/`off` are booleans, `0x1F` and `017` are integers
//! and a float needs a decimal point. Quoted scalars are always
//! strings. Duplicate keys resolve to the last value, and merge keys
//! (`<<`) are expanded.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use thiserror::Error;
use yaml_rust2::parser::{Event, EventReceiver, Parser};
use yaml_rust2::scanner::TScalarStyle;

/// The document couldn't be decoded as YAML data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// A description of what failed to decode.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

/// Compile one of the resolver expressions below.
fn resolver(pattern: &str) -> Regex {
    Regex::new(pattern).expect("resolver expressions are valid")
}

static INT_BIN: Lazy<Regex> = Lazy::new(|| resolver(r"^([-+]?)0b([01_]+)$"));
static INT_HEX: Lazy<Regex> = Lazy::new(|| resolver(r"^([-+]?)0x([0-9a-fA-F_]+)$"));
static INT_OCT: Lazy<Regex> = Lazy::new(|| resolver(r"^([-+]?)0([0-7_]+)$"));
static INT_DEC: Lazy<Regex> = Lazy::new(|| resolver(r"^([-+]?)(0|[1-9][0-9_]*)$"));
static INT_SEXAGESIMAL: Lazy<Regex> =
    Lazy::new(|| resolver(r"^([-+]?)([1-9][0-9_]*(?::[0-5]?[0-9])+)$"));
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    resolver(r"^(?:[-+]?[0-9][0-9_]*\.[0-9_]*(?:[eE][-+][0-9]+)?|\.[0-9][0-9_]*(?:[eE][-+][0-9]+)?)$")
});
static FLOAT_SEXAGESIMAL: Lazy<Regex> =
    Lazy::new(|| resolver(r"^([-+]?)([0-9][0-9_]*(?::[0-5]?[0-9])+\.[0-9_]*)$"));

/// Build a JSON integer from a sign and a magnitude.
fn integer(negative: bool, magnitude: u128, text: &str) -> Result<Value, ParseError> {
    let number = if negative {
        i128::try_from(magnitude)
            .ok()
            .and_then(|m| i64::try_from(-m).ok())
            .map(Number::from)
    } else {
        u64::try_from(magnitude).ok().map(Number::from)
    };
    number
        .map(Value::Number)
        .ok_or_else(|| ParseError::new(format!("integer {} is out of range", text)))
}

/// Parse digits that may contain `_` separators.
fn digits(text: &str, radix: u32) -> Result<u128, ParseError> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(&cleaned, radix)
        .map_err(|_| ParseError::new(format!("integer {} is out of range", text)))
}

/// Build a JSON float, refusing values JSON can't carry.
fn float(value: f64, text: &str) -> Result<Value, ParseError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ParseError::new(format!("number {} can't be represented in JSON", text)))
}

/// Resolve an untagged plain scalar into a typed value.
fn resolve_plain(text: &str) -> Result<Value, ParseError> {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Ok(Value::Null),
        "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => {
            return Ok(Value::Bool(true))
        }
        "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off" | "OFF" => {
            return Ok(Value::Bool(false))
        }
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" | "-.inf" | "-.Inf" | "-.INF"
        | ".nan" | ".NaN" | ".NAN" => {
            return Err(ParseError::new(format!(
                "number {} can't be represented in JSON",
                text
            )))
        }
        _ => (),
    }
    for (expression, radix) in [(&INT_BIN, 2), (&INT_HEX, 16), (&INT_OCT, 8), (&INT_DEC, 10)] {
        if let Some(captures) = expression.captures(text) {
            return integer(&captures[1] == "-", digits(&captures[2], radix)?, text);
        }
    }
    if let Some(captures) = INT_SEXAGESIMAL.captures(text) {
        let mut magnitude: u128 = 0;
        for part in captures[2].split(':') {
            magnitude = magnitude
                .checked_mul(60)
                .and_then(|m| m.checked_add(digits(part, 10).ok()?))
                .ok_or_else(|| ParseError::new(format!("integer {} is out of range", text)))?;
        }
        return integer(&captures[1] == "-", magnitude, text);
    }
    if FLOAT.is_match(text) {
        let cleaned: String = text.chars().filter(|c| *c != '_').collect();
        let value = cleaned
            .parse::<f64>()
            .map_err(|e| ParseError::new(format!("invalid float {}: {}", text, e)))?;
        return float(value, text);
    }
    if let Some(captures) = FLOAT_SEXAGESIMAL.captures(text) {
        let mut value = 0.0;
        for part in captures[2].split(':') {
            let cleaned: String = part.chars().filter(|c| *c != '_').collect();
            let part = cleaned
                .parse::<f64>()
                .map_err(|e| ParseError::new(format!("invalid float {}: {}", text, e)))?;
            value = value * 60.0 + part;
        }
        return float(if &captures[1] == "-" { -value } else { value }, text);
    }
    Ok(Value::String(text.to_string()))
}

/// The text form of a scalar used as a mapping key, as JSON would
/// encode it.
fn key_text(key: Value) -> Result<String, ParseError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::from("null")),
        other => Err(ParseError::new(format!(
            "unsupported mapping key {}; keys must be scalars",
            other
        ))),
    }
}

/// The mappings merged by a `<<` key, ordered so that later ones
/// take precedence.
fn merge_sources(value: Value) -> Result<Vec<Map<String, Value>>, ParseError> {
    match value {
        Value::Object(source) => Ok(vec![source]),
        Value::Array(items) => items
            .into_iter()
            .rev()
            .map(|item| match item {
                Value::Object(source) => Ok(source),
                _ => Err(ParseError::new(
                    "merge key expects a mapping or a sequence of mappings",
                )),
            })
            .collect(),
        _ => Err(ParseError::new(
            "merge key expects a mapping or a sequence of mappings",
        )),
    }
}

/// What the next value completes inside a mapping.
enum PendingKey {
    Field(String),
    Merge,
}

/// A collection still being built.
enum Frame {
    Sequence {
        anchor: usize,
        items: Vec<Value>,
    },
    Mapping {
        anchor: usize,
        entries: Map<String, Value>,
        merges: Vec<Map<String, Value>>,
        key: Option<PendingKey>,
    },
}

/// Builds JSON values out of parser events. The first failure is kept
/// and later events are ignored.
#[derive(Default)]
struct Composer {
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    root: Option<Value>,
    error: Option<ParseError>,
}

impl EventReceiver for Composer {
    fn on_event(&mut self, event: Event) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.accept(event) {
            self.error = Some(e);
        }
    }
}

impl Composer {
    fn accept(&mut self, event: Event) -> Result<(), ParseError> {
        match event {
            Event::Scalar(text, style, anchor, tag) => {
                if tag.is_some() {
                    return Err(ParseError::new(format!(
                        "unsupported tag on scalar {:?}",
                        text
                    )));
                }
                let plain = matches!(style, TScalarStyle::Plain);
                let merge_key = plain && text == "<<";
                let value = if plain {
                    resolve_plain(&text)?
                } else {
                    Value::String(text)
                };
                self.complete(anchor, value, merge_key)
            }
            Event::SequenceStart(anchor, tag) => {
                if tag.is_some() {
                    return Err(ParseError::new("unsupported tag on sequence"));
                }
                self.stack.push(Frame::Sequence {
                    anchor,
                    items: Vec::new(),
                });
                Ok(())
            }
            Event::MappingStart(anchor, tag) => {
                if tag.is_some() {
                    return Err(ParseError::new("unsupported tag on mapping"));
                }
                self.stack.push(Frame::Mapping {
                    anchor,
                    entries: Map::new(),
                    merges: Vec::new(),
                    key: None,
                });
                Ok(())
            }
            Event::SequenceEnd | Event::MappingEnd => match self.stack.pop() {
                Some(Frame::Sequence { anchor, items }) => {
                    self.complete(anchor, Value::Array(items), false)
                }
                Some(Frame::Mapping {
                    anchor,
                    entries,
                    merges,
                    ..
                }) => {
                    let mut merged = Map::new();
                    for (key, value) in merges.into_iter().flatten().chain(entries) {
                        merged.insert(key, value);
                    }
                    self.complete(anchor, Value::Object(merged), false)
                }
                None => Err(ParseError::new("unbalanced collection end")),
            },
            Event::Alias(id) => {
                let value = self
                    .anchors
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| ParseError::new("alias refers to an unfinished anchor"))?;
                self.complete(0, value, false)
            }
            _ => Ok(()),
        }
    }

    /// Place a finished value into its parent collection, or make it
    /// the document root.
    fn complete(&mut self, anchor: usize, value: Value, merge_key: bool) -> Result<(), ParseError> {
        if anchor > 0 {
            self.anchors.insert(anchor, value.clone());
        }
        match self.stack.last_mut() {
            None => {
                if self.root.is_some() {
                    return Err(ParseError::new(
                        "expected a single document in the stream, found more",
                    ));
                }
                self.root = Some(value);
            }
            Some(Frame::Sequence { items, .. }) => items.push(value),
            Some(Frame::Mapping {
                entries,
                merges,
                key,
                ..
            }) => match key.take() {
                None => {
                    *key = Some(if merge_key {
                        PendingKey::Merge
                    } else {
                        PendingKey::Field(key_text(value)?)
                    })
                }
                Some(PendingKey::Field(name)) => {
                    entries.insert(name, value);
                }
                Some(PendingKey::Merge) => merges.extend(merge_sources(value)?),
            },
        }
        Ok(())
    }
}

/// Decode a single YAML document into JSON data. An empty stream
/// decodes to `null`.
pub fn decode(text: &str) -> Result<Value, ParseError> {
    let mut composer = Composer::default();
    let mut parser = Parser::new(text.chars());
    parser
        .load(&mut composer, true)
        .map_err(|e| ParseError::new(e.to_string()))?;
    if let Some(error) = composer.error {
        return Err(error);
    }
    Ok(composer.root.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_1_1_booleans_are_resolved() {
        assert_eq!(
            decode("a: yes\nb: No\nc: on\nd: OFF\ne: true\nf: False\n").unwrap(),
            json!({"a": true, "b": false, "c": true, "d": false, "e": true, "f": false})
        );
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        assert_eq!(
            decode("a: 'no'\nb: \"on\"\nc: '12'\nd: \"~\"\n").unwrap(),
            json!({"a": "no", "b": "on", "c": "12", "d": "~"})
        );
    }

    #[test]
    fn single_letters_are_strings() {
        assert_eq!(decode("a: y\nb: n\n").unwrap(), json!({"a": "y", "b": "n"}));
    }

    #[test]
    fn nulls_are_resolved() {
        assert_eq!(
            decode("a: ~\nb: null\nc:\nd: NULL\n").unwrap(),
            json!({"a": null, "b": null, "c": null, "d": null})
        );
    }

    #[test]
    fn integers_follow_yaml_1_1_forms() {
        assert_eq!(
            decode("dec: 1_000\nneg: -42\nhex: 0x1F\noct: 017\nbin: 0b101\nsex: 1:30\nzero: 0\n")
                .unwrap(),
            json!({"dec": 1000, "neg": -42, "hex": 31, "oct": 15, "bin": 5, "sex": 90, "zero": 0})
        );
    }

    #[test]
    fn floats_need_a_decimal_point() {
        assert_eq!(
            decode("a: 1.5\nb: 1e5\nc: 6.0e+2\nd: .5\ne: 09\n").unwrap(),
            json!({"a": 1.5, "b": "1e5", "c": 600.0, "d": 0.5, "e": "09"})
        );
    }

    #[test]
    fn non_finite_floats_are_refused() {
        assert!(decode("a: .inf\n").is_err());
        assert!(decode("a: .NaN\n").is_err());
    }

    #[test]
    fn duplicate_keys_keep_the_last_value() {
        assert_eq!(
            decode("account: '1'\nregion: us-east-1\naccount: '2'\n").unwrap(),
            json!({"account": "2", "region": "us-east-1"})
        );
    }

    #[test]
    fn merge_keys_prefer_explicit_then_earlier_sources() {
        let value = decode(
            "\
base: &base {region: eu-west-1, size: small}
extra: &extra {region: us-east-1, tier: gold}
entry:
  <<: [*base, *extra]
  size: large
",
        )
        .unwrap();
        assert_eq!(
            value["entry"],
            json!({"region": "eu-west-1", "size": "large", "tier": "gold"})
        );
    }

    #[test]
    fn aliases_repeat_anchored_values() {
        assert_eq!(
            decode("a: &regions [us-east-1, eu-west-1]\nb: *regions\n").unwrap(),
            json!({"a": ["us-east-1", "eu-west-1"], "b": ["us-east-1", "eu-west-1"]})
        );
    }

    #[test]
    fn scalar_keys_use_their_json_text() {
        assert_eq!(
            decode("1: one\nyes: two\n~: three\n").unwrap(),
            json!({"1": "one", "true": "two", "null": "three"})
        );
    }

    #[test]
    fn collection_keys_are_refused() {
        assert!(decode("? [a, b]\n: value\n").is_err());
    }

    #[test]
    fn tags_are_refused() {
        assert!(decode("account: !Secret abc\n").is_err());
        assert!(decode("account: !Secret {a: 1}\n").is_err());
    }

    #[test]
    fn multiple_documents_are_refused() {
        assert!(decode("a: 1\n---\nb: 2\n").is_err());
    }

    #[test]
    fn empty_stream_is_null() {
        assert_eq!(decode("").unwrap(), Value::Null);
        assert_eq!(decode("# nothing here\n").unwrap(), Value::Null);
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(decode("account: [unclosed\nstacksets: {").is_err());
    }
}
