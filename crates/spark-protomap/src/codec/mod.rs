//! # codec 模块说明
//!
//! ## 角色定位（Why）
//! - 线上值（`prost_reflect::Value`）与逻辑值（[`crate::Value`]）之间的双向转换，
//!   由字段解析好的 [`FieldBehavior`](crate::FieldBehavior) 驱动，不做运行时形状探测；
//! - 同键元素的合并规则与整条消息的字段级合并也集中在这里。
//!
//! ## 子模块
//! - `decode`：线上 → 逻辑，实现 map-by / map / set / counter / succession / nullable；
//! - `encode`：逻辑 → 线上，数值按字段类型截断，未知枚举名上报后保持字段未设置；
//! - `merge`：同键元素的合并规则与 Protobuf 风格的消息合并。

mod decode;
mod encode;
mod merge;

pub(crate) use decode::decode_field;
pub(crate) use encode::write_field;
pub(crate) use merge::merge_message;

use prost_reflect::{FieldDescriptor, Kind};

use crate::{
    error::ProtoMapError,
    schema::{FieldHandle, SchemaDef, kind_label},
    value::Value,
};

/// 行为引用的子字段在元素定义中的句柄。
fn sub_handle<'d>(element: &'d SchemaDef, field: &FieldDescriptor) -> &'d FieldHandle {
    element
        .handle_for(field)
        .expect("behavior sub-fields are resolved against the element type")
}

/// 字段描述中引用的消息类型；map 条目类型同样适用。
fn message_kind(field: &FieldDescriptor) -> Option<prost_reflect::MessageDescriptor> {
    match field.kind() {
        Kind::Message(message) => Some(message),
        _ => None,
    }
}

fn mismatch(field: &FieldHandle, value: &Value) -> ProtoMapError {
    ProtoMapError::TypeMismatch {
        field: field.full_name().to_owned(),
        expected: kind_label(&field.descriptor().kind()),
        found: value.kind_name(),
    }
}

fn enum_type_name(field: &FieldHandle) -> String {
    match field.descriptor().kind() {
        Kind::Enum(enumeration) => enumeration.full_name().to_owned(),
        other => kind_label(&other),
    }
}
