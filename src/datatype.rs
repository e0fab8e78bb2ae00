// used for date attributes
use chrono::{NaiveDate, NaiveDateTime};

// used to print out readable forms of a value
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ------------- Attribute kinds --------------
/// Declared domain of an attribute column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeKind {
    /// Metric values, optionally bounded to a closed range.
    Numeric { range: Option<(f64, f64)> },
    /// Metric values that must be integral.
    Integer,
    /// Values from a finite, ordered set of levels.
    Ordinal { order: Vec<String> },
    /// Unordered labels; when categories are declared, other labels are out of domain.
    Categoric { categories: Option<Vec<String>> },
    Date,
    /// Identifier column, carried along but never turned into statements.
    Name,
}

impl AttributeKind {
    pub const NUMERIC: &'static str = "numeric";
    pub const INTEGER: &'static str = "integer";
    pub const ORDINAL: &'static str = "ordinal";
    pub const CATEGORIC: &'static str = "categoric";
    pub const DATE: &'static str = "date";
    pub const NAME: &'static str = "name";

    /// Builds a kind from a schema type token. Ordinal attributes need their
    /// levels (comma separated, lowest first); categoric attributes may declare them.
    pub fn from_schema(token: &str, values: Option<&str>) -> Result<Self> {
        let levels = || -> Option<Vec<String>> {
            values
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect::<Vec<_>>())
                .filter(|v| !v.is_empty())
        };
        match token.trim().to_lowercase().as_str() {
            Self::NUMERIC | "metric" => Ok(Self::Numeric { range: None }),
            Self::INTEGER => Ok(Self::Integer),
            Self::ORDINAL => match levels() {
                Some(order) => Ok(Self::Ordinal { order }),
                None => Err(MinerError::configuration("ordinal attribute declared without its ordered levels")),
            },
            Self::CATEGORIC | "categorical" => Ok(Self::Categoric { categories: levels() }),
            Self::DATE => Ok(Self::Date),
            Self::NAME => Ok(Self::Name),
            other => Err(MinerError::configuration(format!("unknown attribute type '{other}'"))),
        }
    }
    pub fn data_type(&self) -> &'static str {
        match self {
            Self::Numeric { .. } => Self::NUMERIC,
            Self::Integer => Self::INTEGER,
            Self::Ordinal { .. } => Self::ORDINAL,
            Self::Categoric { .. } => Self::CATEGORIC,
            Self::Date => Self::DATE,
            Self::Name => Self::NAME,
        }
    }
    pub fn is_metric(&self) -> bool {
        matches!(self, Self::Numeric { .. } | Self::Integer)
    }
    /// Parses one raw cell. The error is a bare reason; the caller adds record and
    /// attribute context.
    pub fn parse(&self, raw: &str, missing_symbol: &str) -> std::result::Result<Value, String> {
        let raw = raw.trim();
        if raw.is_empty() || raw == missing_symbol {
            return Ok(Value::Missing);
        }
        match self {
            Self::Numeric { range } => {
                let v: f64 = raw.parse().map_err(|_| format!("'{raw}' is not numeric"))?;
                if !v.is_finite() {
                    return Err(format!("'{raw}' is not a finite number"));
                }
                if let Some((lo, hi)) = range {
                    if v < *lo || v > *hi {
                        return Err(format!("{v} lies outside the declared range [{lo}, {hi}]"));
                    }
                }
                Ok(Value::Numeric(v))
            }
            Self::Integer => raw
                .parse::<i64>()
                .map(|v| Value::Numeric(v as f64))
                .map_err(|_| format!("'{raw}' is not an integer")),
            Self::Ordinal { order } => order
                .iter()
                .position(|level| level == raw)
                .map(Value::Ordinal)
                .ok_or_else(|| format!("'{raw}' is not one of the ordinal levels {order:?}")),
            Self::Categoric { categories } => match categories {
                Some(declared) if !declared.iter().any(|c| c == raw) => {
                    Err(format!("'{raw}' is not one of the declared categories {declared:?}"))
                }
                _ => Ok(Value::Categoric(raw.to_string())),
            },
            Self::Date => parse_date(raw).ok_or_else(|| format!("'{raw}' is not a date")).map(Value::Date),
            Self::Name => Ok(Value::Categoric(raw.to_string())),
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.data_type())
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, DATE_FORMAT).ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
}

// ------------- Values --------------
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Numeric(f64),
    /// Rank within the attribute's declared order.
    Ordinal(usize),
    Categoric(String),
    Date(NaiveDateTime),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Categoric(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "?"),
            Value::Numeric(v) => write!(f, "{v}"),
            Value::Ordinal(rank) => write!(f, "#{rank}"),
            Value::Categoric(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_TIME_FORMAT)),
        }
    }
}
