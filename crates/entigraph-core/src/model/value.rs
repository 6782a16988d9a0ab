use serde::{Deserialize, Serialize};

/// Primitive kind a field is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Bool,
    Int,
    Float,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
        };
        f.write_str(name)
    }
}

/// A primitive field value
///
/// Floats compare by bit pattern, so `NaN` equals itself and every value is
/// equal to its own copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::String(_) => FieldKind::String,
            Value::Bool(_) => FieldKind::Bool,
            Value::Int(_) => FieldKind::Int,
            Value::Float(_) => FieldKind::Float,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_variant() {
        assert_eq!(Value::from("x").kind(), FieldKind::String);
        assert_eq!(Value::from(true).kind(), FieldKind::Bool);
        assert_eq!(Value::from(7).kind(), FieldKind::Int);
        assert_eq!(Value::from(1.5).kind(), FieldKind::Float);
    }

    #[test]
    fn test_accessors_reject_other_kinds() {
        let v = Value::from("prop");
        assert_eq!(v.as_str(), Some("prop"));
        assert_eq!(v.as_int(), None);
        assert_eq!(Value::from(3).as_int(), Some(3));
        assert_eq!(Value::from(false).as_str(), None);
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from(1.5), Value::from(1.5));
        assert_ne!(Value::from(0.0), Value::from(-0.0));
        assert_ne!(Value::from(1.0), Value::from(1));
    }

    #[test]
    fn test_json_shape_is_tagged() {
        let json = serde_json::to_string(&Value::from("a")).unwrap();
        assert_eq!(json, r#"{"string":"a"}"#);
    }
}
