use std::fmt;
use std::sync::Arc;
use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::error::{Chainable, Result};

pub type Dict<K = Arc<str>, V = Value> = BTreeMap<K, V>;

/// Represents any valid value in a data record.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Num(Num),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Dict(Arc<Dict>),
}

impl Value {
    /// Converts any serializable `value` into a `Value`.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
        serde_json::to_value(value)
            .and_then(serde_json::from_value)
            .chain_with(|| error! {
                "value is not representable as a data record",
                "type" => std::any::type_name::<T>(),
            })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None
        }
    }

    pub fn to_num(&self) -> Option<Num> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None
        }
    }

    pub fn into_str(self) -> Result<Arc<str>, Value> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(self),
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(v) => Some(&**v),
            _ => None
        }
    }

    pub fn into_dict(self) -> Result<Arc<Dict>, Value> {
        match self {
            Value::Dict(v) => Ok(v),
            _ => Err(self)
        }
    }

    /// Whether `self` counts as true in a condition: everything except
    /// `null`, `false`, zero, `NaN`, and the empty string.
    ///
    /// ```rust
    /// use gazette::value::Value;
    ///
    /// assert!(!Value::Null.is_truthy());
    /// assert!(!Value::from("").is_truthy());
    /// assert!(!Value::from(0).is_truthy());
    /// assert!(!Value::from(f64::NAN).is_truthy());
    /// assert!(Value::from("0").is_truthy());
    /// assert!(Value::from(Vec::<Value>::new()).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => !n.is_zero_or_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Dict(_) => true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
        }
    }
}

/// The string form used when a value is substituted into a template.
///
/// `null` renders as nothing, arrays as their comma-separated elements, and
/// dictionaries as compact JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => b.fmt(f),
            Value::Num(n) => n.fmt(f),
            Value::String(s) => f.write_str(s),
            Value::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i != 0 { f.write_str(",")?; }
                    value.fmt(f)?;
                }

                Ok(())
            }
            Value::Dict(dict) => {
                let json = serde_json::to_string(dict).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($($T:ty),+ => $E:ident::$kind:ident) => {
        $(
            impl From<$T> for $E {
                fn from(value: $T) -> Self {
                    $E::$kind(value.into())
                }
            }
        )+
    };
}

impl_from_primitive!(bool => Value::Bool);
impl_from_primitive!(&str => Value::String);
impl_from_primitive!(std::borrow::Cow<'_, str> => Value::String);
impl_from_primitive!(String => Value::String);
impl_from_primitive!(Arc<str> => Value::String);
impl_from_primitive!(Arc<Vec<Value>> => Value::Array);
impl_from_primitive!(Arc<Dict> => Value::Dict);
impl_from_primitive!(u8, u16, u32, u64, usize => Value::Num);
impl_from_primitive!(i8, i16, i32, i64, isize => Value::Num);
impl_from_primitive!(f32, f64 => Value::Num);

impl From<()> for Value  {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T> From<Option<T>> for Value where Value: From<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl<T> From<Vec<T>> for Value where Value: From<T> {
    fn from(value: Vec<T>) -> Self {
        value.into_iter()
            .map(Value::from)
            .collect()
    }
}

impl<K, V> From<Dict<K, V>> for Value where Arc<str>: From<K>, Value: From<V> {
    fn from(value: Dict<K, V>) -> Self {
        let dict = value.into_iter()
            .map(|(k, v)| (<Arc::<str>>::from(k), Value::from(v)))
            .collect::<Dict>();

        Value::Dict(Arc::new(dict))
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let vec = iter.into_iter().collect::<Vec<Value>>();
        Value::Array(Arc::new(vec))
    }
}

/// A numeric value: a signed or unsigned integer, or a float.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Num {
    /// A signed integer.
    Int(i64),
    /// An unsigned integer too large for `Int`.
    UInt(u64),
    /// A floating point number.
    Float(f64),
}

impl Num {
    pub fn to_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::UInt(v) => v as f64,
            Num::Float(v) => v,
        }
    }

    /// Converts `self` into an `i64` if it is integral and in range.
    pub fn to_i64(self) -> Option<i64> {
        match self {
            Num::Int(v) => Some(v),
            Num::UInt(v) => i64::try_from(v).ok(),
            Num::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(v as i64),
            Num::Float(_) => None,
        }
    }

    pub fn is_zero_or_nan(self) -> bool {
        match self {
            Num::Int(v) => v == 0,
            Num::UInt(v) => v == 0,
            Num::Float(v) => v == 0.0 || v.is_nan(),
        }
    }
}

impl PartialEq for Num {
    fn eq(&self, other: &Self) -> bool {
        match (*self, *other) {
            (Num::Int(a), Num::Int(b)) => a == b,
            (Num::UInt(a), Num::UInt(b)) => a == b,
            (Num::Int(i), Num::UInt(u)) | (Num::UInt(u), Num::Int(i)) => {
                u64::try_from(i).map_or(false, |i| i == u)
            }
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

/// ```rust
/// use gazette::value::Num;
///
/// assert_eq!(Num::from(3.0).to_string(), "3");
/// assert_eq!(Num::from(2.5).to_string(), "2.5");
/// assert_eq!(Num::from(-7).to_string(), "-7");
/// assert_eq!(Num::from(f64::NAN).to_string(), "NaN");
/// ```
impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Num::Int(v) => v.fmt(f),
            Num::UInt(v) => v.fmt(f),
            Num::Float(v) if v.is_nan() => f.write_str("NaN"),
            Num::Float(v) if v.is_infinite() && v > 0.0 => f.write_str("Infinity"),
            Num::Float(v) if v.is_infinite() => f.write_str("-Infinity"),
            Num::Float(v) if v.fract() == 0.0 && v.abs() < 1e21 => write!(f, "{v:.0}"),
            Num::Float(v) => v.fmt(f),
        }
    }
}

macro_rules! impl_from_for_num_value {
    ($($T:ty: $V:ident as $C:ty),* $(,)?) => ($(
        impl From<$T> for Num {
            fn from(value: $T) -> Num {
                Num::$V(value as $C)
            }
        }
    )*)
}

impl_from_for_num_value! {
    u8: Int as i64, u16: Int as i64, u32: Int as i64, u64: UInt as u64, usize: UInt as u64,
    i8: Int as i64, i16: Int as i64, i32: Int as i64, i64: Int as i64, isize: Int as i64,
    f32: Float as f64, f64: Float as f64,
}

macro_rules! impl_try_from_value {
    ($($T:ty),+ => | $v:ident | $e:expr) => {
        $(
            impl TryFrom<$crate::value::Value> for $T {
                type Error = Value;

                fn try_from($v: $crate::value::Value) -> Result<Self, Self::Error> {
                    (|| $e)()
                }
            }
        )+
    };
}

impl_try_from_value!(bool => |v| v.to_bool().ok_or(v));
impl_try_from_value!(Arc<str> => |v| v.into_str());
impl_try_from_value!(Arc<Dict> => |v| v.into_dict());
impl_try_from_value!(Num => |v| v.to_num().ok_or(v));
impl_try_from_value!(i64, usize => |v| {
    v.to_num().and_then(|n| n.to_i64()?.try_into().ok()).ok_or(v)
});
