use std::{
    collections::hash_map::DefaultHasher,
    fmt,
    hash::{Hash, Hasher},
};

use indexmap::{IndexMap, IndexSet};

use super::Value;

/// 与顺序无关的哈希：逐项独立求哈希后做环绕加法。
///
/// `IndexMap`/`IndexSet` 的相等性与插入顺序无关，哈希必须与之保持一致。
fn unordered_hash<I, T>(items: I) -> u64
where
    I: IntoIterator<Item = T>,
    T: Hash,
{
    items.into_iter().fold(0u64, |acc, item| {
        let mut h = DefaultHasher::new();
        item.hash(&mut h);
        acc.wrapping_add(h.finish())
    })
}

/// 保持首次插入顺序的有序映射。
///
/// # 教案式说明
/// - **意图 (Why)**：`map-by` / `map` 字段按元素出现顺序折叠为映射，调用方需要稳定的迭代顺序；
/// - **契约 (What)**：键唯一；重复插入同一键保留原位置、替换值；相等性与哈希与顺序无关；
/// - **风险 (Trade-offs)**：删除使用 `shift_remove` 以保序，代价为 O(n)。
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OrderedMap(IndexMap<Value, Value>);

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.get(key)
    }

    /// 以字符串查找，依次尝试 `Value::String` 与 `Value::Enum` 两种键形态。
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.0
            .get(&Value::String(key.to_owned()))
            .or_else(|| self.0.get(&Value::Enum(key.into())))
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.0.contains_key(key)
    }

    /// 插入或替换，返回旧值。
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Value, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, Value, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> indexmap::map::Values<'_, Value, Value> {
        self.0.values()
    }

    pub(crate) fn entry_mut(&mut self, key: Value) -> indexmap::map::Entry<'_, Value, Value> {
        self.0.entry(key)
    }
}

impl Hash for OrderedMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        unordered_hash(self.0.iter()).hash(state);
    }
}

impl fmt::Debug for OrderedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for OrderedMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<Value>, V: Into<Value>> Extend<(K, V)> for OrderedMap {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        self.0
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl IntoIterator for OrderedMap {
    type Item = (Value, Value);
    type IntoIter = indexmap::map::IntoIter<Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a OrderedMap {
    type Item = (&'a Value, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// 保持首次插入顺序的有序集合。
///
/// - **契约 (What)**：成员唯一；`remove` 对不存在的成员是空操作（墓碑可先于成员出现）。
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OrderedSet(IndexSet<Value>);

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, item: &Value) -> bool {
        self.0.contains(item)
    }

    /// 插入成员；已存在时保持原位置并返回 `false`。
    pub fn insert(&mut self, item: impl Into<Value>) -> bool {
        self.0.insert(item.into())
    }

    /// 移除成员；不存在时返回 `false` 且不报错。
    pub fn remove(&mut self, item: &Value) -> bool {
        self.0.shift_remove(item)
    }

    pub fn iter(&self) -> indexmap::set::Iter<'_, Value> {
        self.0.iter()
    }
}

impl Hash for OrderedSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        unordered_hash(self.0.iter()).hash(state);
    }
}

impl fmt::Debug for OrderedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#")?;
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl<T: Into<Value>> FromIterator<T> for OrderedSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> Extend<T> for OrderedSet {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for OrderedSet {
    type Item = Value;
    type IntoIter = indexmap::set::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a OrderedSet {
    type Item = &'a Value;
    type IntoIter = indexmap::set::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
