//! 逻辑 → 线上。
//!
//! # 教案式说明
//! - **意图 (Why)**：把调用方给出的逻辑值写入可变消息，repeated 字段按行为还原为线上元素序列；
//! - **契约 (What)**：
//!   - 写入前先清空 repeated 字段的旧内容（整体替换）；
//!   - `Null` 写入 `nullable` 单值字段得到哨兵，写入其它字段则清除该字段；
//!   - 数值按字段线上类型截断（`i64 → int32` 等）；
//!   - 未知枚举名上报 `warn!`，字段（或列表元素）保持未设置；
//!   - 其它无法编码的值返回 `TypeMismatch` / `SchemaMismatch`，调用方丢弃整个构建器。

use std::collections::HashMap;

use bytes::Bytes;
use prost_reflect::{
    DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, MapKey, MessageDescriptor,
    Value as WireValue,
};
use tracing::warn;

use crate::{
    error::{ProtoMapError, Result},
    record::RecordView,
    schema::{FieldBehavior, FieldHandle, SchemaDef},
    value::Value,
};

use super::{enum_type_name, message_kind, mismatch, sub_handle};

/// 将逻辑值写入 `message` 的字段。
pub(crate) fn write_field(
    def: &SchemaDef,
    message: &mut DynamicMessage,
    field: &FieldHandle,
    value: &Value,
) -> Result<()> {
    let descriptor = field.descriptor();
    if value.is_null() && (field.is_repeated() || !field.is_nullable()) {
        message.clear_field(descriptor);
        return Ok(());
    }

    let wire = if descriptor.is_map() {
        WireValue::Map(encode_native_map(def, field, value)?)
    } else if descriptor.is_list() {
        WireValue::List(encode_repeated(def, field, value)?)
    } else {
        match encode_element(def, field, value)? {
            Some(wire) => wire,
            None => {
                message.clear_field(descriptor);
                return Ok(());
            }
        }
    };

    message
        .try_set_field(descriptor, wire)
        .map_err(|_| mismatch(field, value))
}

/// 列表与集合逐个元素展开，其它值视为单个元素。
fn elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::List(items) => items.iter().collect(),
        Value::Set(members) => members.iter().collect(),
        other => vec![other],
    }
}

fn encode_each(def: &SchemaDef, field: &FieldHandle, values: Vec<&Value>) -> Result<Vec<WireValue>> {
    let mut items = Vec::with_capacity(values.len());
    for value in values {
        if let Some(wire) = encode_element(def, field, value)? {
            items.push(wire);
        }
    }
    Ok(items)
}

fn encode_repeated(def: &SchemaDef, field: &FieldHandle, value: &Value) -> Result<Vec<WireValue>> {
    match field.behavior() {
        FieldBehavior::Plain
        | FieldBehavior::NativeMap
        | FieldBehavior::Counter
        | FieldBehavior::Succession => encode_each(def, field, elements(value)),
        FieldBehavior::MapBy { key, .. } => match value {
            Value::Map(entries) => {
                let element_def = def.nested(key.parent_message());
                let key_handle = sub_handle(&element_def, key);
                let mut items = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let element = RecordView::from_value(element_def.clone(), v)?
                        .assoc(key_handle, k.clone())?;
                    items.push(WireValue::Message(element.into_message()));
                }
                Ok(items)
            }
            Value::List(_) | Value::Set(_) => encode_each(def, field, elements(value)),
            other => Err(mismatch(field, other)),
        },
        FieldBehavior::Map { key, val, .. } => match value {
            Value::Map(entries) => {
                let element_def = def.nested(key.parent_message());
                let key_handle = sub_handle(&element_def, key);
                let val_handle = sub_handle(&element_def, val);
                let mut items = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let mut entry = element_def.new_builder();
                    write_field(&element_def, &mut entry, key_handle, k)?;
                    write_field(&element_def, &mut entry, val_handle, v)?;
                    items.push(WireValue::Message(entry));
                }
                Ok(items)
            }
            Value::List(_) | Value::Set(_) => encode_each(def, field, elements(value)),
            other => Err(mismatch(field, other)),
        },
        FieldBehavior::Set { item, exists } => {
            let events: Vec<(&Value, bool)> = match value {
                Value::Set(members) => members.iter().map(|m| (m, true)).collect(),
                Value::List(members) => members.iter().map(|m| (m, true)).collect(),
                Value::Map(entries) => entries
                    .iter()
                    .map(|(member, present)| {
                        present.as_bool().map(|present| (member, present)).ok_or_else(|| {
                            ProtoMapError::TypeMismatch {
                                field: field.full_name().to_owned(),
                                expected: "bool membership flag".to_owned(),
                                found: present.kind_name(),
                            }
                        })
                    })
                    .collect::<Result<_>>()?,
                other => return Err(mismatch(field, other)),
            };

            let element_def = def.nested(item.parent_message());
            let item_handle = sub_handle(&element_def, item);
            let exists_handle = sub_handle(&element_def, exists);
            let mut items = Vec::with_capacity(events.len());
            for (member, present) in events {
                let mut entry = element_def.new_builder();
                write_field(&element_def, &mut entry, item_handle, member)?;
                write_field(&element_def, &mut entry, exists_handle, &Value::Bool(present))?;
                items.push(WireValue::Message(entry));
            }
            Ok(items)
        }
    }
}

/// 单个元素；`None` 表示未知枚举名，调用方保持字段（或元素）未设置。
fn encode_element(def: &SchemaDef, field: &FieldHandle, value: &Value) -> Result<Option<WireValue>> {
    if value.is_null() {
        let Some(sentinel) = field.null_sentinel() else {
            return Err(mismatch(field, value));
        };
        if let (WireValue::EnumNumber(number), Kind::Enum(enumeration)) =
            (sentinel, field.descriptor().kind())
            && enumeration.get_value(*number).is_none()
        {
            warn!(
                enum_type = enumeration.full_name(),
                field = field.full_name(),
                number = *number,
                "null sentinel names no enum value"
            );
        }
        return Ok(Some(sentinel.clone()));
    }

    let wire = match field.descriptor().kind() {
        Kind::Double => WireValue::F64(float(field, value)?),
        Kind::Float => WireValue::F32(float(field, value)? as f32),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => WireValue::I32(int(field, value)? as i32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => WireValue::I64(int(field, value)?),
        Kind::Uint32 | Kind::Fixed32 => WireValue::U32(uint(field, value)? as u32),
        Kind::Uint64 | Kind::Fixed64 => WireValue::U64(uint(field, value)?),
        Kind::Bool => WireValue::Bool(value.as_bool().ok_or_else(|| mismatch(field, value))?),
        Kind::String => match value {
            Value::String(text) => WireValue::String(text.clone()),
            Value::Enum(key) => WireValue::String(key.to_string()),
            other => return Err(mismatch(field, other)),
        },
        Kind::Bytes => match value {
            Value::Bytes(bytes) => WireValue::Bytes(bytes.clone()),
            Value::String(text) => WireValue::Bytes(Bytes::copy_from_slice(text.as_bytes())),
            other => return Err(mismatch(field, other)),
        },
        Kind::Enum(enumeration) => return encode_enum(def, field, &enumeration, value),
        Kind::Message(message) => {
            WireValue::Message(encode_message(def, field, &message, value)?)
        }
    };
    Ok(Some(wire))
}

fn int(field: &FieldHandle, value: &Value) -> Result<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::UInt(v) => Ok(*v as i64),
        Value::Float(v) => Ok(*v as i64),
        other => Err(mismatch(field, other)),
    }
}

fn uint(field: &FieldHandle, value: &Value) -> Result<u64> {
    match value {
        Value::UInt(v) => Ok(*v),
        Value::Int(v) => Ok(*v as u64),
        Value::Float(v) => Ok(*v as u64),
        other => Err(mismatch(field, other)),
    }
}

fn float(field: &FieldHandle, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| mismatch(field, value))
}

fn encode_enum(
    def: &SchemaDef,
    field: &FieldHandle,
    enumeration: &EnumDescriptor,
    value: &Value,
) -> Result<Option<WireValue>> {
    let name = match value {
        Value::Enum(key) => key.as_str(),
        Value::String(text) => text.as_str(),
        Value::Int(number) => {
            let known = i32::try_from(*number)
                .ok()
                .filter(|number| enumeration.get_value(*number).is_some());
            if known.is_none() {
                warn!(
                    enum_type = enumeration.full_name(),
                    field = field.full_name(),
                    number = *number,
                    "unknown enum number; leaving the field unset"
                );
            }
            return Ok(known.map(WireValue::EnumNumber));
        }
        other => return Err(mismatch(field, other)),
    };

    if let Some(number) = field.enum_keys().and_then(|keys| keys.number(name)) {
        return Ok(Some(WireValue::EnumNumber(number)));
    }
    match enumeration.get_value_by_name(&def.naming().wire_name(name)) {
        Some(enum_value) => Ok(Some(WireValue::EnumNumber(enum_value.number()))),
        None => {
            warn!(
                enum_type = %enum_type_name(field),
                field = field.full_name(),
                name,
                "unknown enum value; leaving the field unset"
            );
            Ok(None)
        }
    }
}

/// 同类型记录直接取其消息；逻辑映射按嵌套定义构建新记录。
fn encode_message(
    def: &SchemaDef,
    field: &FieldHandle,
    message: &MessageDescriptor,
    value: &Value,
) -> Result<DynamicMessage> {
    match value {
        Value::Record(record) if record.schema().descriptor() == message => {
            Ok(record.message().clone())
        }
        Value::Record(record) => Err(ProtoMapError::SchemaMismatch {
            expected: message.full_name().to_owned(),
            found: record.schema().full_name().to_owned(),
        }),
        Value::Map(_) => {
            let nested = def.nested(message);
            Ok(RecordView::from_value(nested, value)?.into_message())
        }
        other => Err(mismatch(field, other)),
    }
}

fn encode_native_map(
    def: &SchemaDef,
    field: &FieldHandle,
    value: &Value,
) -> Result<HashMap<MapKey, WireValue>> {
    let (Value::Map(entries), Some(entry_type)) = (value, message_kind(field.descriptor())) else {
        return Err(mismatch(field, value));
    };
    let entry_def = def.nested(&entry_type);
    let key_field = entry_type.map_entry_key_field();
    let key_handle = sub_handle(&entry_def, &key_field);
    let value_handle = sub_handle(&entry_def, &entry_type.map_entry_value_field());

    let mut map = HashMap::with_capacity(entries.len());
    for (k, v) in entries {
        let key = map_key(&key_field, k).ok_or_else(|| mismatch(key_handle, k))?;
        if let Some(wire) = encode_element(&entry_def, value_handle, v)? {
            map.insert(key, wire);
        }
    }
    Ok(map)
}

fn map_key(field: &FieldDescriptor, value: &Value) -> Option<MapKey> {
    let key = match field.kind() {
        Kind::Bool => MapKey::Bool(value.as_bool()?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => MapKey::I32(value.as_i64()? as i32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => MapKey::I64(value.as_i64()?),
        Kind::Uint32 | Kind::Fixed32 => MapKey::U32(value.as_u64()? as u32),
        Kind::Uint64 | Kind::Fixed64 => MapKey::U64(value.as_u64()?),
        Kind::String => MapKey::String(value.as_str()?.to_owned()),
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_expand_collections_only() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(elements(&list).len(), 2);
        assert_eq!(elements(&Value::Int(7)), vec![&Value::Int(7)]);
    }
}
