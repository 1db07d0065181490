use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Parser for a user-defined flag type.
pub type SetFn = Arc<dyn Fn(&str) -> anyhow::Result<Arc<dyn Any + Send + Sync>> + Send + Sync>;

/// A typed flag value: either a flag's declared default or its resolved value.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Duration(Duration),
    List(Vec<String>),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// `Some` only for [`Value::Bool`]; the other accessors follow suit.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// The value of a [`Flag::custom`](crate::Flag::custom) flag, if it holds a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(v) => v.downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Uint(v) => f.debug_tuple("Uint").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::Duration(v) => f.debug_tuple("Duration").field(v).finish(),
            Self::List(v) => f.debug_tuple("List").field(v).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Renders defaults the way a help screen would show them.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Duration(v) => write!(f, "{v:?}"),
            Self::List(v) => f.write_str(&v.join(",")),
            Self::Custom(_) => f.write_str("<custom>"),
        }
    }
}

/// How a flag turns raw text into a [`Value`].
#[derive(Clone)]
pub(crate) enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Str,
    Duration,
    List,
    Custom(SetFn),
}

impl Kind {
    /// Everything except booleans consumes the next token when no inline value is given.
    pub(crate) fn takes_value(&self) -> bool {
        !matches!(self, Self::Bool)
    }

    /// Parse one occurrence. `List` yields a single-element list; the caller accumulates.
    pub(crate) fn parse(&self, raw: &str) -> Result<Value, String> {
        match self {
            Self::Bool => parse_bool(raw).map(Value::Bool),
            Self::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| e.to_string()),
            Self::Uint => raw
                .trim()
                .parse::<u64>()
                .map(Value::Uint)
                .map_err(|e| e.to_string()),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| e.to_string()),
            Self::Str => Ok(Value::Str(raw.to_string())),
            Self::Duration => parse_duration(raw).map(Value::Duration),
            Self::List => Ok(Value::List(vec![raw.to_string()])),
            Self::Custom(set) => set(raw).map(Value::Custom).map_err(|e| format!("{e:#}")),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Str => "string",
            Self::Duration => "duration",
            Self::List => "list",
            Self::Custom(_) => "custom",
        }
    }
}

/// Boolean spellings. An empty value (`--flag=`) counts as `true`.
pub fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err("not a bool value".to_string()),
    }
}

/// Parse a compound duration such as `1h30m`, `1.5s` or `250ms`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let s = raw.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(format!("invalid duration: {s}"));
        }
        let number: f64 = rest[..num_len]
            .parse()
            .map_err(|_| format!("invalid number in duration: {s}"))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration: {s}")),
            unit => return Err(format!("unknown unit {unit:?} in duration: {s}")),
        };
        rest = &rest[unit_len..];

        total += number * nanos_per_unit;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(format!("duration out of range: {s}"));
    }
    Ok(Duration::from_nanos(total.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_spellings() {
        for raw in ["", "true", "T", "yes", "Y", "1"] {
            assert_eq!(parse_bool(raw), Ok(true), "{raw:?}");
        }
        for raw in ["false", "F", "NO", "n", "0"] {
            assert_eq!(parse_bool(raw), Ok(false), "{raw:?}");
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("2us"), Ok(Duration::from_nanos(2000)));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("ms").is_err());
    }

    #[test]
    fn unsigned_rejects_negative() {
        assert_eq!(Kind::Uint.parse(" 42 ").unwrap().as_uint(), Some(42));
        assert!(Kind::Uint.parse("-1").is_err());
        assert_eq!(Kind::Uint.parse("7").unwrap().as_int(), None);
    }

    #[test]
    fn custom_kind_delegates_to_setter() {
        let set: SetFn = Arc::new(|raw: &str| -> anyhow::Result<Arc<dyn Any + Send + Sync>> {
            let port: u16 = raw.parse()?;
            Ok(Arc::new(port))
        });
        let kind = Kind::Custom(set);
        let value = kind.parse("8080").unwrap();
        assert_eq!(value.downcast_ref::<u16>(), Some(&8080));
        assert!(kind.parse("http").is_err());
    }
}
