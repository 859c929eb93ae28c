use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability to read a boundary element as a floating-point value
///
/// Returning `None` marks the element as absent; absent boundaries are skipped
/// during a bucket scan.
pub trait ExtractDouble<E: ?Sized> {
    fn extract_double(&self, element: &E) -> Option<f64>;
}

impl<E: ?Sized, F> ExtractDouble<E> for F
where
    F: Fn(&E) -> Option<f64>,
{
    #[inline]
    fn extract_double(&self, element: &E) -> Option<f64> {
        self(element)
    }
}

/// Comparator for boundaries that are already native doubles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeDouble;

impl ExtractDouble<f64> for NativeDouble {
    #[inline]
    fn extract_double(&self, element: &f64) -> Option<f64> {
        Some(*element)
    }
}

impl ExtractDouble<Option<f64>> for NativeDouble {
    #[inline]
    fn extract_double(&self, element: &Option<f64>) -> Option<f64> {
        *element
    }
}

/// A single boundary value as handed over by the query engine
///
/// Deserializes from JSON `null`, integers, floats and strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    Null,
    BigInt(i64),
    Double(f64),
    Varchar(String),
}

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Element::Double(value)
    }
}

impl From<Option<f64>> for Element {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Element::Null, Element::Double)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::BigInt(value)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Varchar(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::Varchar(value)
    }
}

/// The closed set of element kinds a boundary sequence can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Double,
    Real,
    BigInt,
    Integer,
    Varchar,
}

impl ElementType {
    /// Base name used when naming generated routines and signatures
    pub fn base_name(&self) -> &'static str {
        match self {
            ElementType::Double => "double",
            ElementType::Real => "real",
            ElementType::BigInt => "bigint",
            ElementType::Integer => "integer",
            ElementType::Varchar => "varchar",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

/// An exact integer carried as a double, as engines emit for integral literals
fn integral(value: f64) -> Option<f64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value)
}

impl ExtractDouble<Element> for ElementType {
    fn extract_double(&self, element: &Element) -> Option<f64> {
        match (self, element) {
            (_, Element::Null) => None,
            (ElementType::Double, Element::Double(v)) => Some(*v),
            (ElementType::Double, Element::BigInt(v)) => Some(*v as f64),
            // REAL values are single precision; widen what the engine stored
            (ElementType::Real, Element::Double(v)) => Some(*v as f32 as f64),
            (ElementType::Real, Element::BigInt(v)) => Some(*v as f32 as f64),
            (ElementType::BigInt, Element::BigInt(v)) => Some(*v as f64),
            (ElementType::BigInt, Element::Double(v)) => integral(*v),
            (ElementType::Integer, Element::BigInt(v)) => i32::try_from(*v).ok().map(f64::from),
            (ElementType::Integer, Element::Double(v)) => integral(*v)
                .filter(|v| (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(v)),
            (ElementType::Varchar, Element::Varchar(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}
