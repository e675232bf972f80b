//! Parameter value storage and the typed view onto it.
//!
//! [`ParamValue`] is the erased storage for every supported parameter type;
//! [`ParamType`] maps a concrete Rust type onto its variant and supplies the
//! steering-string parser. The textual type tags (`"int"`, `"vector<float>"`,
//! ...) are stable identifiers used by the steering dump.

use crate::ConfigError;
use crate::configuration::ConfigValue;

/// Erased parameter value. One variant per supported parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    BoolVec(Vec<bool>),
    IntVec(Vec<i64>),
    UIntVec(Vec<u64>),
    FloatVec(Vec<f64>),
    StrVec(Vec<String>),
}

impl ParamValue {
    /// Stable textual type tag.
    pub fn type_str(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::UInt(_) => "uint",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "string",
            ParamValue::BoolVec(_) => "vector<bool>",
            ParamValue::IntVec(_) => "vector<int>",
            ParamValue::UIntVec(_) => "vector<uint>",
            ParamValue::FloatVec(_) => "vector<float>",
            ParamValue::StrVec(_) => "vector<string>",
        }
    }

    /// Render the value for dumps and diagnostics. Vectors are
    /// space-separated.
    pub fn render(&self) -> String {
        fn join<T: ToString>(items: &[T]) -> String {
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        }
        match self {
            ParamValue::Bool(v) => v.to_string(),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::UInt(v) => v.to_string(),
            ParamValue::Float(v) => v.to_string(),
            ParamValue::Str(v) => v.clone(),
            ParamValue::BoolVec(v) => join(v),
            ParamValue::IntVec(v) => join(v),
            ParamValue::UIntVec(v) => join(v),
            ParamValue::FloatVec(v) => join(v),
            ParamValue::StrVec(v) => v.join(" "),
        }
    }
}

/// A Rust type usable as a parameter type.
pub trait ParamType: Clone + Sized {
    /// Stable textual type tag, matching [`ParamValue::type_str`].
    const TYPE_STR: &'static str;

    fn into_value(self) -> ParamValue;

    /// Typed view onto an erased value. `None` on variant mismatch.
    fn from_value(value: &ParamValue) -> Option<Self>;

    /// Parse a steering value into this type's variant.
    fn parse(name: &str, raw: &ConfigValue) -> Result<ParamValue, ConfigError>;
}

fn expect_scalar<'a>(name: &str, raw: &'a ConfigValue) -> Result<&'a str, ConfigError> {
    match raw {
        ConfigValue::Scalar(s) => Ok(s),
        ConfigValue::List(_) => Err(ConfigError::Parse {
            name: name.to_string(),
            message: "expected a single value, found a list".to_string(),
        }),
    }
}

/// Items of a list value. A scalar is treated as a whitespace-separated list
/// so `EventList = "1 0 2 0"` and `EventList = [1, 0, 2, 0]` are equivalent.
fn list_items(raw: &ConfigValue) -> Vec<String> {
    match raw {
        ConfigValue::Scalar(s) => s.split_whitespace().map(str::to_string).collect(),
        ConfigValue::List(items) => items.clone(),
    }
}

fn parse_bool(name: &str, s: &str) -> Result<bool, ConfigError> {
    match s.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::Parse {
            name: name.to_string(),
            message: format!("'{other}' is not a bool"),
        }),
    }
}

impl ParamType for bool {
    const TYPE_STR: &'static str = "bool";
    fn into_value(self) -> ParamValue {
        ParamValue::Bool(self)
    }
    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
    fn parse(name: &str, raw: &ConfigValue) -> Result<ParamValue, ConfigError> {
        parse_bool(name, expect_scalar(name, raw)?).map(ParamValue::Bool)
    }
}

impl ParamType for String {
    const TYPE_STR: &'static str = "string";
    fn into_value(self) -> ParamValue {
        ParamValue::Str(self)
    }
    fn from_value(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
    fn parse(name: &str, raw: &ConfigValue) -> Result<ParamValue, ConfigError> {
        Ok(ParamValue::Str(expect_scalar(name, raw)?.to_string()))
    }
}

macro_rules! numeric_param {
    ($ty:ty, $tag:literal, $variant:ident) => {
        impl ParamType for $ty {
            const TYPE_STR: &'static str = $tag;
            fn into_value(self) -> ParamValue {
                ParamValue::$variant(self)
            }
            fn from_value(value: &ParamValue) -> Option<Self> {
                match value {
                    ParamValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }
            fn parse(name: &str, raw: &ConfigValue) -> Result<ParamValue, ConfigError> {
                expect_scalar(name, raw)?
                    .trim()
                    .parse::<$ty>()
                    .map(ParamValue::$variant)
                    .map_err(|e| ConfigError::Parse {
                        name: name.to_string(),
                        message: e.to_string(),
                    })
            }
        }
    };
}

numeric_param!(i64, "int", Int);
numeric_param!(u64, "uint", UInt);
numeric_param!(f64, "float", Float);

macro_rules! vector_param {
    ($ty:ty, $tag:literal, $variant:ident, $item:expr) => {
        impl ParamType for Vec<$ty> {
            const TYPE_STR: &'static str = $tag;
            fn into_value(self) -> ParamValue {
                ParamValue::$variant(self)
            }
            fn from_value(value: &ParamValue) -> Option<Self> {
                match value {
                    ParamValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
            fn parse(name: &str, raw: &ConfigValue) -> Result<ParamValue, ConfigError> {
                list_items(raw)
                    .iter()
                    .map(|item| $item(name, item))
                    .collect::<Result<Vec<$ty>, ConfigError>>()
                    .map(ParamValue::$variant)
            }
        }
    };
}

fn parse_item<T: std::str::FromStr>(name: &str, item: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    item.trim().parse::<T>().map_err(|e| ConfigError::Parse {
        name: name.to_string(),
        message: format!("'{item}': {e}"),
    })
}

vector_param!(bool, "vector<bool>", BoolVec, parse_bool);
vector_param!(i64, "vector<int>", IntVec, parse_item::<i64>);
vector_param!(u64, "vector<uint>", UIntVec, parse_item::<u64>);
vector_param!(f64, "vector<float>", FloatVec, parse_item::<f64>);
vector_param!(
    String,
    "vector<string>",
    StrVec,
    (|_name: &str, item: &str| Ok::<String, ConfigError>(item.to_string()))
);
