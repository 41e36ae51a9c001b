//! 线上 → 逻辑。
//!
//! # 教案式说明
//! - **契约 (What)**：
//!   - 解码不会失败：未知枚举编号上报 `warn!` 后读为 `Null`；
//!   - `behaviors = false` 时 repeated 字段一律读为列表（原始视图）；
//!   - 空的 `counter` / `succession` 读为 `Null`，不伪造 0；
//!   - 原生 map 按键排序，保证同一消息多次读取结果一致。

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use indexmap::map::Entry;
use prost_reflect::{DynamicMessage, FieldDescriptor, MapKey, ReflectMessage, Value as WireValue};
use tracing::warn;

use crate::{
    record::RecordView,
    schema::{FieldBehavior, FieldHandle, MergeMarkers, SchemaDef},
    value::{OrderedMap, OrderedSet, Value},
};

use super::{enum_type_name, merge::combine, message_kind, sub_handle};

/// 将字段的线上值转换为逻辑值。
pub(crate) fn decode_field(
    def: &SchemaDef,
    field: &FieldHandle,
    wire: &WireValue,
    behaviors: bool,
) -> Value {
    match wire {
        WireValue::List(items) if behaviors => decode_repeated(def, field, items),
        WireValue::List(items) => Value::List(
            items
                .iter()
                .map(|item| decode_element(def, field, item))
                .collect(),
        ),
        WireValue::Map(entries) => decode_native_map(def, field, entries),
        scalar => decode_element(def, field, scalar),
    }
}

fn decode_repeated(def: &SchemaDef, field: &FieldHandle, items: &[WireValue]) -> Value {
    match field.behavior() {
        FieldBehavior::Plain | FieldBehavior::NativeMap => Value::List(
            items
                .iter()
                .map(|item| decode_element(def, field, item))
                .collect(),
        ),
        FieldBehavior::Counter => items
            .iter()
            .map(|item| decode_element(def, field, item))
            .fold(Value::Null, sum),
        FieldBehavior::Succession => items
            .last()
            .map_or(Value::Null, |last| decode_element(def, field, last)),
        FieldBehavior::MapBy { key, markers } => decode_map_by(def, items, key, markers),
        FieldBehavior::Map { key, val, markers } => decode_map(def, items, key, val, markers),
        FieldBehavior::Set { item, exists } => decode_set(def, items, item, exists),
    }
}

/// 单个（非 repeated）线上值。
pub(super) fn decode_element(def: &SchemaDef, field: &FieldHandle, wire: &WireValue) -> Value {
    if field.null_sentinel() == Some(wire) {
        return Value::Null;
    }

    match wire {
        WireValue::Bool(v) => Value::Bool(*v),
        WireValue::I32(v) => Value::Int(i64::from(*v)),
        WireValue::I64(v) => Value::Int(*v),
        WireValue::U32(v) => Value::UInt(u64::from(*v)),
        WireValue::U64(v) => Value::UInt(*v),
        WireValue::F32(v) => Value::Float(f64::from(*v)),
        WireValue::F64(v) => Value::Float(*v),
        WireValue::String(v) => Value::String(v.clone()),
        WireValue::Bytes(v) => Value::Bytes(v.clone()),
        WireValue::EnumNumber(number) => decode_enum(field, *number),
        WireValue::Message(message) => {
            let nested = def.nested(&message.descriptor());
            Value::Record(record(nested, message))
        }
        WireValue::List(_) | WireValue::Map(_) => decode_field(def, field, wire, false),
    }
}

fn record(def: Arc<SchemaDef>, message: &DynamicMessage) -> RecordView {
    RecordView::from_parts(def, Arc::new(message.clone()), None)
}

fn decode_enum(field: &FieldHandle, number: i32) -> Value {
    match field.enum_keys().and_then(|keys| keys.key(number)) {
        Some(key) => Value::Enum(key.clone()),
        None => {
            warn!(
                enum_type = %enum_type_name(field),
                field = field.full_name(),
                number,
                "unknown enum number; reading the field as null"
            );
            Value::Null
        }
    }
}

/// 计数器折叠；整数溢出时记录 `warn!` 并饱和到类型边界。
fn sum(acc: Value, next: Value) -> Value {
    match (acc, next) {
        (Value::Null, next) => next,
        (acc, Value::Null) => acc,
        (Value::Int(a), Value::Int(b)) => Value::Int(a.checked_add(b).unwrap_or_else(|| {
            warn!(total = a, element = b, "counter overflowed; saturating");
            a.saturating_add(b)
        })),
        (Value::UInt(a), Value::UInt(b)) => Value::UInt(a.checked_add(b).unwrap_or_else(|| {
            warn!(total = a, element = b, "counter overflowed; saturating");
            u64::MAX
        })),
        (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (acc, _) => acc,
    }
}

fn insert_merged(map: &mut OrderedMap, key: Value, value: Value, markers: &MergeMarkers) {
    match map.entry_mut(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
        }
        Entry::Occupied(mut slot) => {
            let existing = std::mem::take(slot.get_mut());
            *slot.get_mut() = combine(existing, value, markers);
        }
    }
}

/// 元素按自身的键子字段折叠为有序映射；键子字段未设置时键为 `Null`。
fn decode_map_by(
    def: &SchemaDef,
    items: &[WireValue],
    key: &FieldDescriptor,
    markers: &MergeMarkers,
) -> Value {
    let element_def = def.nested(key.parent_message());
    let key_handle = sub_handle(&element_def, key).clone();

    let mut map = OrderedMap::new();
    for item in items {
        let WireValue::Message(message) = item else {
            continue;
        };
        let element = record(Arc::clone(&element_def), message);
        let k = element.get(&key_handle).unwrap_or_default();
        insert_merged(&mut map, k, Value::Record(element), markers);
    }
    Value::Map(map)
}

fn decode_map(
    def: &SchemaDef,
    items: &[WireValue],
    key: &FieldDescriptor,
    val: &FieldDescriptor,
    markers: &MergeMarkers,
) -> Value {
    let element_def = def.nested(key.parent_message());
    let key_handle = sub_handle(&element_def, key);
    let val_handle = sub_handle(&element_def, val);

    let mut map = OrderedMap::new();
    for item in items {
        let WireValue::Message(entry) = item else {
            continue;
        };
        let k = decode_field(&element_def, key_handle, &entry.get_field(key), true);
        let v = decode_field(&element_def, val_handle, &entry.get_field(val), true);
        insert_merged(&mut map, k, v, markers);
    }
    Value::Map(map)
}

/// `exists = true` 插入，`exists = false` 移除；移除不存在的成员是空操作。
fn decode_set(
    def: &SchemaDef,
    items: &[WireValue],
    item: &FieldDescriptor,
    exists: &FieldDescriptor,
) -> Value {
    let element_def = def.nested(item.parent_message());
    let item_handle = sub_handle(&element_def, item);

    let mut set = OrderedSet::new();
    for element in items {
        let WireValue::Message(entry) = element else {
            continue;
        };
        let member = decode_field(&element_def, item_handle, &entry.get_field(item), true);
        if entry.get_field(exists).as_bool().unwrap_or(false) {
            set.insert(member);
        } else {
            set.remove(&member);
        }
    }
    Value::Set(set)
}

fn decode_native_map(
    def: &SchemaDef,
    field: &FieldHandle,
    entries: &HashMap<MapKey, WireValue>,
) -> Value {
    let Some(entry_type) = message_kind(field.descriptor()) else {
        return Value::Map(OrderedMap::new());
    };
    let entry_def = def.nested(&entry_type);
    let value_handle = sub_handle(&entry_def, &entry_type.map_entry_value_field());

    let mut sorted: Vec<(Value, &WireValue)> = entries
        .iter()
        .map(|(key, value)| (map_key_value(key), value))
        .collect();
    sorted.sort_by(|a, b| compare_keys(&a.0, &b.0));

    sorted
        .into_iter()
        .map(|(key, value)| (key, decode_field(&entry_def, value_handle, value, true)))
        .collect::<OrderedMap>()
        .into()
}

fn map_key_value(key: &MapKey) -> Value {
    match key {
        MapKey::Bool(v) => Value::Bool(*v),
        MapKey::I32(v) => Value::Int(i64::from(*v)),
        MapKey::I64(v) => Value::Int(*v),
        MapKey::U32(v) => Value::UInt(u64::from(*v)),
        MapKey::U64(v) => Value::UInt(*v),
        MapKey::String(v) => Value::String(v.clone()),
    }
}

fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_sum_skips_nulls_and_saturates() {
        let total = [Value::Int(2), Value::Null, Value::Int(3), Value::Int(5)]
            .into_iter()
            .fold(Value::Null, sum);
        assert_eq!(total, Value::Int(10));
        assert_eq!(sum(Value::Int(i64::MAX), Value::Int(1)), Value::Int(i64::MAX));
        assert_eq!(sum(Value::Int(i64::MIN), Value::Int(-1)), Value::Int(i64::MIN));
        assert_eq!(sum(Value::UInt(u64::MAX), Value::UInt(1)), Value::UInt(u64::MAX));
        assert_eq!(
            [Value::Float(0.5), Value::Float(1.25)]
                .into_iter()
                .fold(Value::Null, sum),
            Value::Float(1.75)
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn counter_overflow_is_reported() {
        let total = [Value::Int(i64::MAX - 1), Value::Int(1), Value::Int(1)]
            .into_iter()
            .fold(Value::Null, sum);
        assert_eq!(total, Value::Int(i64::MAX));
        assert!(logs_contain("counter overflowed"));
    }

    #[test]
    fn empty_counter_folds_to_null() {
        assert_eq!(std::iter::empty().fold(Value::Null, sum), Value::Null);
    }

    #[test]
    fn native_map_keys_sort_within_their_kind() {
        let mut keys = vec![Value::from("b"), Value::from("a"), Value::from("c")];
        keys.sort_by(compare_keys);
        assert_eq!(keys, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
    }
}
