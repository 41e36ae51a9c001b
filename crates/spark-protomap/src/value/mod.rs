//! # value 模块说明
//!
//! ## 角色定位（Why）
//! - 线上值（`prost_reflect::Value`）只有标量、枚举编号、嵌套消息与列表；调用方看到的是更丰富的逻辑值：
//!   有序映射、有序集合、计数器求和、“后继”折叠与可空哨兵还原后的 `Null`。
//! - 本模块只定义逻辑值本身，线上 ⇄ 逻辑的转换位于 [`crate::codec`]。
//!
//! ## 数值拓宽（How）
//! - 有符号 32/64 位整型统一为 [`Value::Int`]，无符号统一为 [`Value::UInt`]，`float`/`double` 统一为
//!   [`Value::Float`]；读方向无损拓宽，写方向按字段类型截断。
//!
//! ## 相等性（What）
//! - `Value` 实现 `Eq` 与 `Hash`，浮点按位比较（`NaN` 与自身相等），使其可作为映射键与集合成员；
//! - 集合类值的相等性与顺序无关。

mod key;
mod ordered;

use std::{fmt, hash::Hash};

use bytes::Bytes;

pub use key::Key;
pub use ordered::{OrderedMap, OrderedSet};

use crate::record::RecordView;

/// 逻辑值。
///
/// # 教案式说明
/// - **意图 (Why)**：为反射得到的字段值提供一个封闭、可穷举匹配的表示，避免在转换逻辑中做运行时类型探测；
/// - **契约 (What)**：
///   - `Enum` 承载经命名策略映射后的枚举值标识符；
///   - `Record` 是嵌套消息的记录视图，共享同一命名策略；
///   - 所有变体克隆代价低（嵌套记录与字节均为引用计数）。
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    Enum(Key),
    List(Vec<Value>),
    Map(OrderedMap),
    Set(OrderedSet),
    Record(RecordView),
}

impl Value {
    /// 用于错误信息的变体名称。
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Record(_) => "record",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// 整型视图；`UInt` 在可表示范围内同样返回。
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// 字符串视图；枚举标识符同样以字符串形式返回。
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            Value::Enum(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OrderedMap> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&OrderedSet> {
        match self {
            Value::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordView> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<RecordView> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    /// 作为记录键使用时的形态：字符串或枚举标识符。
    pub(crate) fn as_record_key(&self) -> Option<Key> {
        match self {
            Value::String(v) => Some(Key::new(v)),
            Value::Enum(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::UInt(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Enum(v) => v.hash(state),
            Value::List(v) => v.hash(state),
            Value::Map(v) => v.hash(state),
            Value::Set(v) => v.hash(state),
            Value::Record(v) => v.hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("nil"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Bytes(v) => write!(f, "{v:?}"),
            Value::Enum(v) => write!(f, "{v:?}"),
            Value::List(v) => f.debug_list().entries(v).finish(),
            Value::Map(v) => v.fmt(f),
            Value::Set(v) => v.fmt(f),
            Value::Record(v) => v.fmt(f),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int as i64,
    i64 => Int,
    u32 => UInt as u64,
    u64 => UInt,
    f32 => Float as f64,
    f64 => Float,
    String => String,
    Bytes => Bytes,
    Key => Enum,
    Vec<Value> => List,
    OrderedMap => Map,
    OrderedSet => Set,
    RecordView => Record,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn numeric_views_cross_signedness_when_representable() {
        assert_eq!(Value::UInt(7).as_i64(), Some(7));
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::from(3i32), Value::Int(3));
        assert_eq!(Value::from(1.5f32), Value::Float(1.5));
    }

    #[test]
    fn enum_identifiers_read_as_strings() {
        let value = Value::Enum(Key::from("female"));
        assert_eq!(value.as_str(), Some("female"));
        assert_eq!(value.as_record_key(), Some(Key::from("female")));
        assert_eq!(Value::Int(1).as_record_key(), None);
    }
}
