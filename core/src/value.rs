//! Typed values bound from raw command-line strings.
//!
//! A [`ValueType`] pairs a [`ValueKind`] with a cumulative switch. A
//! [`Destination`] owns the bound [`Value`] for one flag or argument: scalar
//! kinds are replaced on every bind, cumulative kinds append.
//!
//! # Examples
//!
//! ```
//! use cmdtree_core::{Destination, Scalar, Value, ValueKind, ValueType};
//!
//! let mut dest = Destination::new(ValueType::one(ValueKind::Hex));
//! dest.bind("0x7B", &[]).unwrap();
//! assert_eq!(dest.current(), Value::One(Scalar::Int(123)));
//!
//! let mut many = Destination::new(ValueType::many(ValueKind::Choice));
//! let hints = vec!["node(s)".to_string(), "pod(s)".to_string()];
//! many.bind("nodes", &hints).unwrap();
//! many.bind("pod", &hints).unwrap();
//! assert_eq!(many.current().to_string(), "node,pod");
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
        .expect("static regex must compile")
});

/// Layouts carrying a numeric offset, tried after RFC 3339 and RFC 2822.
const ZONED_LAYOUTS: &[&str] = &[
    "%d %b %y %H:%M %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Layouts without an offset; values are read as UTC unless a zone
/// abbreviation followed them.
const NAIVE_LAYOUTS: &[&str] = &[
    "%d %b %y %H:%M",
    "%A, %d-%b-%y %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%a %b %e %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Time-only layouts land on the zero date.
const TIME_LAYOUTS: &[&str] = &["%I:%M%p", "%I:%M %p", "%H:%M:%S", "%H:%M"];

/// Zone abbreviations accepted in place of a numeric offset, in hours east.
const ZONE_ABBREVIATIONS: &[(&str, i32)] = &[
    ("UTC", 0),
    ("UT", 0),
    ("GMT", 0),
    ("Z", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
];

/// Base of an integer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Radix {
    Decimal,
    Hex,
    Octal,
    Binary,
}

impl Radix {
    fn base(self) -> u32 {
        match self {
            Self::Decimal => 10,
            Self::Hex => 16,
            Self::Octal => 8,
            Self::Binary => 2,
        }
    }

    fn prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Decimal => &[],
            Self::Hex => &["0x", "0X"],
            Self::Octal => &["0o", "0O"],
            Self::Binary => &["0b", "0B"],
        }
    }
}

impl fmt::Display for Radix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Decimal => "decimal",
            Self::Hex => "hexadecimal",
            Self::Octal => "octal",
            Self::Binary => "binary",
        })
    }
}

/// The closed set of scalar kinds a flag or argument can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Free text (the default).
    #[default]
    Text,
    /// `true`/`false` and the usual single-letter and numeric spellings.
    Bool,
    /// One of the declared hints.
    Choice,
    /// A syntactically valid email address.
    Email,
    /// A glob pattern matching at least one path on disk.
    File,
    /// A point in time in one of the supported layouts.
    Timestamp,
    /// A human-readable span such as `1h 30m`.
    Duration,
    /// An IPv4 or IPv6 address.
    Ip,
    /// Decimal integer.
    Int,
    /// Hexadecimal integer, optional `0x` prefix.
    Hex,
    /// Octal integer, optional `0o` prefix.
    Octal,
    /// Binary integer, optional `0b` prefix.
    Binary,
}

impl ValueKind {
    /// The radix for integer kinds.
    pub fn radix(self) -> Option<Radix> {
        match self {
            Self::Int => Some(Radix::Decimal),
            Self::Hex => Some(Radix::Hex),
            Self::Octal => Some(Radix::Octal),
            Self::Binary => Some(Radix::Binary),
            _ => None,
        }
    }

    /// Parses one raw string into a scalar of this kind.
    ///
    /// `hints` is only consulted by [`ValueKind::Choice`]. A [`ValueKind::File`]
    /// scalar keeps the pattern as typed once it is known to match something.
    pub fn parse(self, raw: &str, hints: &[String]) -> Result<Scalar, ValueError> {
        match self {
            Self::Text => Ok(Scalar::Text(raw.to_string())),
            Self::Bool => parse_bool(raw).map(Scalar::Bool),
            Self::Choice => match_hint(raw, hints).map(Scalar::Choice),
            Self::Email => parse_email(raw).map(Scalar::Email),
            Self::File => {
                expand_files(raw)?;
                Ok(Scalar::File(PathBuf::from(raw)))
            }
            Self::Timestamp => parse_timestamp(raw).map(Scalar::Timestamp),
            Self::Duration => humantime::parse_duration(raw.trim())
                .map(Scalar::Duration)
                .map_err(|e| ValueError::InvalidDuration {
                    value: raw.to_string(),
                    reason: e.to_string(),
                }),
            Self::Ip => raw
                .trim()
                .parse::<IpAddr>()
                .map(Scalar::Ip)
                .map_err(|_| ValueError::InvalidIp(raw.to_string())),
            Self::Int => parse_int(raw, Radix::Decimal).map(Scalar::Int),
            Self::Hex => parse_int(raw, Radix::Hex).map(Scalar::Int),
            Self::Octal => parse_int(raw, Radix::Octal).map(Scalar::Int),
            Self::Binary => parse_int(raw, Radix::Binary).map(Scalar::Int),
        }
    }

    /// Formats a scalar so that [`ValueKind::parse`] reads it back unchanged.
    ///
    /// Integers are written in this kind's radix with its canonical prefix.
    pub fn format(self, scalar: &Scalar) -> String {
        match (self.radix(), scalar) {
            (Some(radix), Scalar::Int(n)) => format_int(*n, radix),
            _ => scalar.to_string(),
        }
    }

    /// The value held before anything is bound.
    pub fn zero(self) -> Scalar {
        match self {
            Self::Text => Scalar::Text(String::new()),
            Self::Bool => Scalar::Bool(false),
            Self::Choice => Scalar::Choice(String::new()),
            Self::Email => Scalar::Email(String::new()),
            Self::File => Scalar::File(PathBuf::new()),
            Self::Timestamp => Scalar::Timestamp(DateTime::<FixedOffset>::default()),
            Self::Duration => Scalar::Duration(Duration::ZERO),
            Self::Ip => Scalar::Ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            Self::Int | Self::Hex | Self::Octal | Self::Binary => Scalar::Int(0),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Choice => "choice",
            Self::Email => "email",
            Self::File => "file",
            Self::Timestamp => "timestamp",
            Self::Duration => "duration",
            Self::Ip => "ip",
            Self::Int => "int",
            Self::Hex => "hex",
            Self::Octal => "octal",
            Self::Binary => "binary",
        })
    }
}

/// A value kind plus whether repeated occurrences accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueType {
    kind: ValueKind,
    cumulative: bool,
}

impl ValueType {
    /// A single value of `kind`; binding again replaces it.
    pub const fn one(kind: ValueKind) -> Self {
        Self {
            kind,
            cumulative: false,
        }
    }

    /// An ordered sequence of `kind`; every bind appends.
    pub const fn many(kind: ValueKind) -> Self {
        Self {
            kind,
            cumulative: true,
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_cumulative(&self) -> bool {
        self.cumulative
    }

    /// Boolean flags take no value token on the command line.
    pub fn is_bool(&self) -> bool {
        self.kind == ValueKind::Bool
    }

    pub fn zero(&self) -> Value {
        if self.cumulative {
            Value::Many(Vec::new())
        } else {
            Value::One(self.kind.zero())
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cumulative {
            write!(f, "[]{}", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// One parsed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Bool(bool),
    Choice(String),
    Email(String),
    File(PathBuf),
    Timestamp(DateTime<FixedOffset>),
    Duration(Duration),
    Ip(IpAddr),
    Int(i64),
}

impl Scalar {
    /// Text, choice and email payloads.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Choice(s) | Self::Email(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Self::File(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_ip(&self) -> Option<IpAddr> {
        match self {
            Self::Ip(ip) => Some(*ip),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Choice(s) | Self::Email(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Timestamp(t) => f.write_str(&t.to_rfc3339()),
            Self::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// The current content of a destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl Value {
    /// The single scalar, or `None` for sequences.
    pub fn scalar(&self) -> Option<&Scalar> {
        match self {
            Self::One(s) => Some(s),
            Self::Many(_) => None,
        }
    }

    /// Every scalar in order; a single value is a one-element slice.
    pub fn items(&self) -> &[Scalar] {
        match self {
            Self::One(s) => std::slice::from_ref(s),
            Self::Many(items) => items,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.scalar().and_then(Scalar::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.scalar().and_then(Scalar::as_bool)
    }

    pub fn as_int(&self) -> Option<i64> {
        self.scalar().and_then(Scalar::as_int)
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        self.scalar().and_then(Scalar::as_path)
    }

    /// Display form of every item, e.g. for a cumulative text argument.
    pub fn strings(&self) -> Vec<String> {
        self.items().iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(s) => write!(f, "{s}"),
            Self::Many(items) => f.write_str(&join(items)),
        }
    }
}

fn join(items: &[Scalar]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Typed storage for one flag or argument.
///
/// Nothing is stored until the first bind; [`Destination::current`] falls back
/// to the type's zero value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Destination {
    value_type: ValueType,
    value: Option<Value>,
}

impl Destination {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            value: None,
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Whether anything has been bound since the last clear.
    pub fn is_bound(&self) -> bool {
        self.value.is_some()
    }

    /// The bound value, or the zero value.
    pub fn current(&self) -> Value {
        self.value
            .clone()
            .unwrap_or_else(|| self.value_type.zero())
    }

    /// Parses `raw` and stores it, appending for cumulative types.
    ///
    /// A cumulative file destination appends every path the pattern matches.
    pub fn bind(&mut self, raw: &str, hints: &[String]) -> Result<(), ValueError> {
        let kind = self.value_type.kind;
        if !self.value_type.cumulative {
            self.value = Some(Value::One(kind.parse(raw, hints)?));
            return Ok(());
        }

        let parsed = if kind == ValueKind::File {
            expand_files(raw)?.into_iter().map(Scalar::File).collect()
        } else {
            vec![kind.parse(raw, hints)?]
        };
        let mut items = match self.value.take() {
            Some(Value::Many(items)) => items,
            _ => Vec::new(),
        };
        items.extend(parsed);
        self.value = Some(Value::Many(items));
        Ok(())
    }

    /// Drops the bound value.
    pub fn clear(&mut self) {
        self.value = None;
    }
}

fn parse_bool(raw: &str) -> Result<bool, ValueError> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ValueError::InvalidBool(raw.to_string())),
    }
}

/// Matches `raw` against the declared hints.
///
/// A hint written as `node(s)` accepts both `node` and `nodes` and yields the
/// singular form.
pub fn match_hint(raw: &str, hints: &[String]) -> Result<String, ValueError> {
    if hints.is_empty() {
        return Err(ValueError::NoHints);
    }
    for hint in hints {
        match hint.strip_suffix("(s)") {
            Some(singular) => {
                if raw == singular || raw.strip_suffix('s') == Some(singular) {
                    return Ok(singular.to_string());
                }
            }
            None => {
                if raw == hint {
                    return Ok(hint.clone());
                }
            }
        }
    }
    Err(ValueError::UnknownChoice {
        value: raw.to_string(),
        hints: hints.to_vec(),
    })
}

fn parse_email(raw: &str) -> Result<String, ValueError> {
    let trimmed = raw.trim();
    if EMAIL_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValueError::InvalidEmail(raw.to_string()))
    }
}

/// Expands a glob pattern, failing when nothing on disk matches.
pub fn expand_files(pattern: &str) -> Result<Vec<PathBuf>, ValueError> {
    let paths = glob::glob(pattern).map_err(|e| ValueError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let matches: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    if matches.is_empty() {
        return Err(ValueError::NoSuchFile(pattern.to_string()));
    }
    Ok(matches)
}

fn parse_int(raw: &str, radix: Radix) -> Result<i64, ValueError> {
    let invalid = || ValueError::InvalidInteger {
        value: raw.to_string(),
        radix,
    };
    let trimmed = raw.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = radix
        .prefixes()
        .iter()
        .find_map(|p| unsigned.strip_prefix(p))
        .unwrap_or(unsigned);
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let magnitude = u64::from_str_radix(digits, radix.base()).map_err(|_| invalid())?;
    let signed = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    i64::try_from(signed).map_err(|_| invalid())
}

fn format_int(n: i64, radix: Radix) -> String {
    let sign = if n < 0 { "-" } else { "" };
    let m = n.unsigned_abs();
    match radix {
        Radix::Decimal => n.to_string(),
        Radix::Hex => format!("{sign}0x{m:X}"),
        Radix::Octal => format!("{sign}0o{m:o}"),
        Radix::Binary => format!("{sign}0b{m:b}"),
    }
}

/// Tries the supported layouts in order.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, ValueError> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(ts);
    }
    for layout in ZONED_LAYOUTS {
        if let Ok(ts) = DateTime::parse_from_str(trimmed, layout) {
            return Ok(ts);
        }
    }

    let (body, offset) = split_zone_abbreviation(trimmed);
    let offset = FixedOffset::east_opt(offset * 3600)
        .ok_or_else(|| ValueError::InvalidTimestamp(raw.to_string()))?;
    parse_naive(body)
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .ok_or_else(|| ValueError::InvalidTimestamp(raw.to_string()))
}

fn split_zone_abbreviation(raw: &str) -> (&str, i32) {
    if let Some((body, zone)) = raw.rsplit_once(' ') {
        if let Some((_, hours)) = ZONE_ABBREVIATIONS.iter().find(|(name, _)| *name == zone) {
            return (body.trim_end(), *hours);
        }
    }
    (raw, 0)
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive);
        }
    }
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    for layout in TIME_LAYOUTS {
        if let Ok(time) = NaiveTime::parse_from_str(raw, layout) {
            return Some(NaiveDate::default().and_time(time));
        }
    }
    None
}
