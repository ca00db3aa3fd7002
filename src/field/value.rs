//! Field types, typed values, and raw string parsing.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// The closed set of types a field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Strings,
    Int,
    Ints,
    Bool,
    Bools,
    Time,
    Times,
    Duration,
    Durations,
}

impl FieldType {
    pub const ALL: [FieldType; 10] = [
        FieldType::String,
        FieldType::Strings,
        FieldType::Int,
        FieldType::Ints,
        FieldType::Bool,
        FieldType::Bools,
        FieldType::Time,
        FieldType::Times,
        FieldType::Duration,
        FieldType::Durations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Strings => "strings",
            FieldType::Int => "int",
            FieldType::Ints => "ints",
            FieldType::Bool => "bool",
            FieldType::Bools => "bools",
            FieldType::Time => "time",
            FieldType::Times => "times",
            FieldType::Duration => "duration",
            FieldType::Durations => "durations",
        }
    }

    /// Returns `true` for the comma-separated list types.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            FieldType::Strings
                | FieldType::Ints
                | FieldType::Bools
                | FieldType::Times
                | FieldType::Durations
        )
    }

    /// Parses a raw string from a loader into a value of this type.
    ///
    /// List types split on `,` and trim surrounding spaces from each element.
    /// Timestamps use RFC 3339; durations use the humantime grammar (`"1h 30m"`, `"250ms"`).
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        match self {
            FieldType::String => Ok(Value::String(raw.to_string())),
            FieldType::Strings => {
                if raw.is_empty() {
                    return Ok(Value::Strings(Vec::new()));
                }
                Ok(Value::Strings(split_list(raw).map(str::to_string).collect()))
            }
            FieldType::Int => parse_int(raw).map(Value::Int),
            FieldType::Ints => split_list(raw)
                .map(parse_int)
                .collect::<Result<_, _>>()
                .map(Value::Ints),
            FieldType::Bool => parse_bool(raw).map(Value::Bool),
            FieldType::Bools => split_list(raw)
                .map(parse_bool)
                .collect::<Result<_, _>>()
                .map(Value::Bools),
            FieldType::Time => parse_time(raw).map(Value::Time),
            FieldType::Times => split_list(raw)
                .map(parse_time)
                .collect::<Result<_, _>>()
                .map(Value::Times),
            FieldType::Duration => parse_duration(raw).map(Value::Duration),
            FieldType::Durations => split_list(raw)
                .map(parse_duration)
                .collect::<Result<_, _>>()
                .map(Value::Durations),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownFieldType(s.to_string()))
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(|elem| elem.trim_matches(' '))
}

fn parse_int(raw: &str) -> Result<i64, String> {
    raw.parse::<i64>().map_err(|e| e.to_string())
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(format!("invalid boolean '{raw}'")),
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Strings(Vec<String>),
    Int(i64),
    Ints(Vec<i64>),
    Bool(bool),
    Bools(Vec<bool>),
    Time(DateTime<Utc>),
    Times(Vec<DateTime<Utc>>),
    Duration(Duration),
    Durations(Vec<Duration>),
}

impl Value {
    /// The runtime type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::String(_) => FieldType::String,
            Value::Strings(_) => FieldType::Strings,
            Value::Int(_) => FieldType::Int,
            Value::Ints(_) => FieldType::Ints,
            Value::Bool(_) => FieldType::Bool,
            Value::Bools(_) => FieldType::Bools,
            Value::Time(_) => FieldType::Time,
            Value::Times(_) => FieldType::Times,
            Value::Duration(_) => FieldType::Duration,
            Value::Durations(_) => FieldType::Durations,
        }
    }

    /// Converts the value into its TOML snapshot form.
    ///
    /// Timestamps become TOML datetimes and durations become humantime strings.
    pub fn to_toml(&self) -> toml::Value {
        fn array<T>(items: &[T], f: impl Fn(&T) -> toml::Value) -> toml::Value {
            toml::Value::Array(items.iter().map(f).collect())
        }

        match self {
            Value::String(s) => toml::Value::String(s.clone()),
            Value::Strings(v) => array(v, |s| toml::Value::String(s.clone())),
            Value::Int(i) => toml::Value::Integer(*i),
            Value::Ints(v) => array(v, |i| toml::Value::Integer(*i)),
            Value::Bool(b) => toml::Value::Boolean(*b),
            Value::Bools(v) => array(v, |b| toml::Value::Boolean(*b)),
            Value::Time(t) => time_to_toml(t),
            Value::Times(v) => array(v, time_to_toml),
            Value::Duration(d) => toml::Value::String(format_duration(d)),
            Value::Durations(v) => array(v, |d| toml::Value::String(format_duration(d))),
        }
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_duration(duration: &Duration) -> String {
    humantime::format_duration(*duration).to_string()
}

fn time_to_toml(time: &DateTime<Utc>) -> toml::Value {
    let formatted = format_time(time);
    match formatted.parse::<toml::value::Datetime>() {
        Ok(datetime) => toml::Value::Datetime(datetime),
        Err(_) => toml::Value::String(formatted),
    }
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut write: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write(f, item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Strings(v) => write_list(f, v, |f, s| f.write_str(s)),
            Value::Int(i) => write!(f, "{i}"),
            Value::Ints(v) => write_list(f, v, |f, i| write!(f, "{i}")),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Bools(v) => write_list(f, v, |f, b| write!(f, "{b}")),
            Value::Time(t) => f.write_str(&format_time(t)),
            Value::Times(v) => write_list(f, v, |f, t| f.write_str(&format_time(t))),
            Value::Duration(d) => f.write_str(&format_duration(d)),
            Value::Durations(v) => write_list(f, v, |f, d| f.write_str(&format_duration(d))),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Value::Strings(value.into_iter().map(str::to_string).collect())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

/// Extraction of a native Rust value from a [`Value`].
///
/// Each implementation is tied to exactly one [`FieldType`]; extraction never converts
/// between types.
pub trait FromValue: Sized {
    const FIELD_TYPE: FieldType;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! value_conversions {
    ($($variant:ident => $native:ty),* $(,)?) => {
        $(
            impl From<$native> for Value {
                fn from(value: $native) -> Self {
                    Value::$variant(value)
                }
            }

            impl FromValue for $native {
                const FIELD_TYPE: FieldType = FieldType::$variant;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(inner) => Some(inner.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

value_conversions! {
    String => String,
    Strings => Vec<String>,
    Int => i64,
    Ints => Vec<i64>,
    Bool => bool,
    Bools => Vec<bool>,
    Time => DateTime<Utc>,
    Times => Vec<DateTime<Utc>>,
    Duration => Duration,
    Durations => Vec<Duration>,
}
