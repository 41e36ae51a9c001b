use prost_reflect::{DynamicMessage, FieldDescriptor, ReflectMessage, Value as WireValue};

use crate::{record::RecordView, schema::MergeMarkers, value::Value};

/// Protobuf 风格的消息合并：`source` 中已设置的单值字段覆盖 `target`，repeated 与 map 追加，
/// 双方都已设置的嵌套消息递归合并。
///
/// - **前置条件**：两条消息同属一个类型。
pub(crate) fn merge_message(target: &mut DynamicMessage, source: &DynamicMessage) {
    debug_assert_eq!(target.descriptor(), source.descriptor());

    for field in source.descriptor().fields() {
        if !source.has_field(&field) {
            continue;
        }
        let incoming = source.get_field(&field);
        match (incoming.as_ref(), target.has_field(&field)) {
            (WireValue::List(items), _) => {
                if let WireValue::List(existing) = target.get_field_mut(&field) {
                    existing.extend(items.iter().cloned());
                }
            }
            (WireValue::Map(entries), _) => {
                if let WireValue::Map(existing) = target.get_field_mut(&field) {
                    existing.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            (WireValue::Message(nested), true) => {
                if let WireValue::Message(existing) = target.get_field_mut(&field) {
                    merge_message(existing, nested);
                }
            }
            (value, _) => target.set_field(&field, value.clone()),
        }
    }
}

/// 同键元素的合并规则（map-by 与 map 的冲突处理）。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - 声明了 `exists` 标记：左侧显式为 false 且右侧显式为 true 时右侧整体替换左侧；
///   - 否则若声明了 `deleted` 标记：左侧显式为 true 且右侧显式为 false 时右侧整体替换左侧；
///   - 其余情况按字段覆盖合并：右侧已设置的字段覆盖左侧，未设置的沿用左侧。
/// - **执行 (How)**：标记只在已设置或声明了默认值时参与比较；未设置的标记不触发替换，
///   因此没有提到标记的部分更新总是逐字段叠加。
fn merge_elements(
    left: &RecordView,
    right: RecordView,
    markers: &MergeMarkers,
) -> RecordView {
    if let Some(exists) = &markers.exists {
        if marker(left, exists) == Some(false) && marker(&right, exists) == Some(true) {
            return right;
        }
        return left.merged(&right);
    }
    if let Some(deleted) = &markers.deleted
        && marker(left, deleted) == Some(true)
        && marker(&right, deleted) == Some(false)
    {
        return right;
    }
    left.merged(&right)
}

fn marker(record: &RecordView, field: &FieldDescriptor) -> Option<bool> {
    let message = record.message();
    let declared_default = field.field_descriptor_proto().default_value.is_some();
    if !message.has_field(field) && !declared_default {
        return None;
    }
    message.get_field(field).as_bool()
}

/// 有序映射中同键值的合并：记录走合并规则，集合类追加，其余替换。
pub(super) fn combine(existing: Value, incoming: Value, markers: &MergeMarkers) -> Value {
    match (existing, incoming) {
        (Value::Record(left), Value::Record(right)) => {
            Value::Record(merge_elements(&left, right, markers))
        }
        (Value::List(mut items), incoming) => {
            items.push(incoming);
            Value::List(items)
        }
        (Value::Set(mut members), incoming) => {
            members.insert(incoming);
            Value::Set(members)
        }
        (Value::Map(mut entries), Value::Map(incoming)) => {
            entries.extend(incoming);
            Value::Map(entries)
        }
        (_, incoming) => incoming,
    }
}
