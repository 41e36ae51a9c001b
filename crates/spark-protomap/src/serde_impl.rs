//! `serde::Serialize` 实现（`serde` 特性）。
//!
//! ## 设计动机（Why）
//! - 审计导出、调试快照需要把记录渲染为 JSON 等通用格式，而不关心 Protobuf 线上格式；
//! - 只提供序列化方向：反序列化必须经过 Schema 解析键，应使用 [`RecordView::from_value`]。
//!
//! ## 映射约定（What）
//! - `Null` → unit；`Enum` 与 `Key` → 字符串；`Bytes` → 字节序列；
//! - `List` / `Set` → 序列；`Map` 与 `RecordView` → 映射，记录按迭代顺序输出（含扩展表条目）。

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{
    record::RecordView,
    value::{Key, OrderedMap, OrderedSet, Value},
};

impl Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_bytes(v),
            Value::Enum(v) => v.serialize(serializer),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => entries.serialize(serializer),
            Value::Set(members) => members.serialize(serializer),
            Value::Record(record) => record.serialize(serializer),
        }
    }
}

impl Serialize for OrderedMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for OrderedSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for member in self {
            seq.serialize_element(member)?;
        }
        seq.end()
    }
}

impl Serialize for RecordView {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in self {
            map.serialize_entry(&key, &value)?;
        }
        map.end()
    }
}
