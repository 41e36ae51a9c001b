use std::slice;

use crate::{
    schema::FieldHandle,
    value::{Key, Value},
};

use super::{Ext, RecordView};

/// 存在的 Schema 字段，按声明顺序，值按需解码。
pub(super) struct FieldEntries<'a> {
    record: &'a RecordView,
    fields: slice::Iter<'a, FieldHandle>,
}

impl<'a> FieldEntries<'a> {
    pub(super) fn new(record: &'a RecordView) -> Self {
        Self {
            record,
            fields: record.def.fields().iter(),
        }
    }
}

impl Iterator for FieldEntries<'_> {
    type Item = (Key, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.record;
        self.fields
            .by_ref()
            .find(|field| record.contains_field(field))
            .map(|field| (field.key().clone(), record.decode(field, true)))
    }
}

/// [`RecordView`] 的键值对迭代器。
///
/// - **契约 (What)**：先产出存在的 Schema 字段，再产出扩展表条目；
///   不修改记录，重新调用 [`RecordView::entries`] 得到相同序列。
pub struct Entries<'a> {
    fields: FieldEntries<'a>,
    ext: Option<indexmap::map::Iter<'a, Key, Value>>,
}

impl<'a> Entries<'a> {
    pub(super) fn new(record: &'a RecordView) -> Self {
        Self {
            fields: FieldEntries::new(record),
            ext: record.ext_map().map(Ext::iter),
        }
    }
}

impl Iterator for Entries<'_> {
    type Item = (Key, Value);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.fields.next() {
            return Some(entry);
        }
        self.ext
            .as_mut()?
            .next()
            .map(|(key, value)| (key.clone(), value.clone()))
    }
}

/// [`RecordView`] 的键迭代器，不解码字段值。
pub struct Keys<'a> {
    record: &'a RecordView,
    fields: slice::Iter<'a, FieldHandle>,
    ext: Option<indexmap::map::Keys<'a, Key, Value>>,
}

impl<'a> Keys<'a> {
    pub(super) fn new(record: &'a RecordView) -> Self {
        Self {
            record,
            fields: record.def.fields().iter(),
            ext: record.ext_map().map(Ext::keys),
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.record;
        if let Some(field) = self.fields.by_ref().find(|field| record.contains_field(field)) {
            return Some(field.key().clone());
        }
        self.ext.as_mut()?.next().cloned()
    }
}
