//! Attribute values and the text conversion rules of spec.md §4.2.1.
//!
//! The closed tagged union recommended in spec.md §9 ("the `T` of attribute
//! properties should itself be a closed tagged union") keeps the slot table
//! monomorphic instead of reaching for a generic `Attribute<T>`.

use std::rc::Rc;

use crate::util::IStr;

/// The closed set of primitive attribute types spec.md §3 allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Double,
    String,
    DateTime,
    IntList,
    FloatList,
    DoubleList,
}

/// A point in time with `yyyy/MM/dd hh:mm:ss` precision — the wire format
/// spec.md §4.2.1 and §6 mandate. No timezone: the source format carries
/// none.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTimeValue {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTimeValue {
    pub fn parse(text: &str) -> Option<Self> {
        let (date, time) = text.split_once(' ')?;
        let mut date_parts = date.split('/');
        let year = date_parts.next()?.parse().ok()?;
        let month = date_parts.next()?.parse().ok()?;
        let day = date_parts.next()?.parse().ok()?;
        let mut time_parts = time.split(':');
        let hour = time_parts.next()?.parse().ok()?;
        let minute = time_parts.next()?.parse().ok()?;
        let second = time_parts.next()?.parse().ok()?;
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    pub fn format(&self) -> String {
        format!(
            "{:04}/{:02}/{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// The runtime value stored in an `Attribute` slot.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(IStr),
    DateTime(DateTimeValue),
    IntList(Vec<i64>),
    FloatList(Vec<f32>),
    DoubleList(Vec<f64>),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            Self::Bool(_) => AttrKind::Bool,
            Self::Int(_) => AttrKind::Int,
            Self::Float(_) => AttrKind::Float,
            Self::Double(_) => AttrKind::Double,
            Self::String(_) => AttrKind::String,
            Self::DateTime(_) => AttrKind::DateTime,
            Self::IntList(_) => AttrKind::IntList,
            Self::FloatList(_) => AttrKind::FloatList,
            Self::DoubleList(_) => AttrKind::DoubleList,
        }
    }

    /// Parses `text` per spec.md §4.2.1's per-type text convention. Returns
    /// `default` for empty text, matching the "empty -> default" rule
    /// shared by every numeric and boolean row of that table.
    pub fn from_text(kind: AttrKind, text: &str, default: &AttrValue) -> Self {
        if text.is_empty() {
            return default.clone();
        }
        match kind {
            AttrKind::Bool => Self::Bool(text == "true"),
            AttrKind::Int => Self::Int(parse_extended_int(text, i64::MIN, i64::MAX)),
            AttrKind::Float => Self::Float(parse_extended_float(text) as f32),
            AttrKind::Double => Self::Double(parse_extended_float(text)),
            AttrKind::String => Self::String(Rc::from(text.replace(';', "-"))),
            AttrKind::DateTime => DateTimeValue::parse(text)
                .map(Self::DateTime)
                .unwrap_or_else(|| default.clone()),
            AttrKind::IntList => Self::IntList(
                text.split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect(),
            ),
            AttrKind::FloatList => Self::FloatList(
                text.split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect(),
            ),
            AttrKind::DoubleList => Self::DoubleList(
                text.split_whitespace()
                    .filter_map(|t| t.parse().ok())
                    .collect(),
            ),
        }
    }

    /// Serializes per spec.md §4.2.1. Callers (the `Attribute` property)
    /// decide whether to emit at all based on the default-value comparison.
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(v) => if *v { "true" } else { "false" }.to_string(),
            Self::Int(v) => match *v {
                i64::MIN => "-\u{221e}".to_string(),
                i64::MAX => "+\u{221e}".to_string(),
                v => v.to_string(),
            },
            Self::Float(v) => format_extended_float(*v as f64),
            Self::Double(v) => format_extended_float(*v),
            Self::String(v) => v.to_string(),
            Self::DateTime(v) => v.format(),
            Self::IntList(v) => v.iter().map(i64::to_string).collect::<Vec<_>>().join(" "),
            Self::FloatList(v) => v.iter().map(f32::to_string).collect::<Vec<_>>().join(" "),
            Self::DoubleList(v) => v.iter().map(f64::to_string).collect::<Vec<_>>().join(" "),
        }
    }
}

fn parse_extended_int(text: &str, min: i64, max: i64) -> i64 {
    match text {
        "-\u{221e}" => min,
        "+\u{221e}" => max,
        _ => text.parse().unwrap_or_default(),
    }
}

fn parse_extended_float(text: &str) -> f64 {
    match text {
        "-\u{221e}" => f64::MIN,
        "+\u{221e}" => f64::MAX,
        _ => text.parse().unwrap_or_default(),
    }
}

fn format_extended_float(v: f64) -> String {
    if v == f64::MIN {
        "-\u{221e}".to_string()
    } else if v == f64::MAX {
        "+\u{221e}".to_string()
    } else {
        v.to_string()
    }
}

/// A normalized, hashable form of an attribute value suitable for use as a
/// map key (spec.md §4.2.4's `link-to-many-map`/`multimap` key).
///
/// Floating-point kinds are deliberately excluded: they are not a sound
/// `Hash`/`Eq` basis for a key and the source system never keys a map by
/// one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    String(IStr),
    DateTime(DateTimeValue),
}

impl MapKey {
    pub fn from_attr(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Bool(v) => Some(Self::Bool(*v)),
            AttrValue::Int(v) => Some(Self::Int(*v)),
            AttrValue::String(v) => Some(Self::String(v.clone())),
            AttrValue::DateTime(v) => Some(Self::DateTime(*v)),
            _ => None,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(v) => if *v { "true" } else { "false" }.to_string(),
            Self::Int(v) => v.to_string(),
            Self::String(v) => v.to_string(),
            Self::DateTime(v) => v.format(),
        }
    }
}
