//! # SchemaRegistry：定义仓储
//!
//! ## 核心意图（Why）
//! - 以（消息类型, [`DefOptions`]）为键记忆化 [`SchemaDef`]，同一类型在不同命名策略或大小上限下
//!   拥有互相独立的定义；
//! - 以显式对象替代环境全局状态：进程级实例经 [`SchemaRegistry::global`] 获取，测试可用
//!   [`SchemaRegistry::new`] 创建互不干扰的隔离实例。
//!
//! ## 行为契约（What）
//! - `def_for`：首次请求时构建并校验该类型及其可达嵌套类型的定义，全部成功后才发布；
//! - 并发首次请求允许重复构建，发布时先写者胜，败者丢弃自己的结果并复用胜者的定义；
//! - 定义永不淘汰，注册表生命周期内同键始终返回同一个 `Arc<SchemaDef>`。
//!
//! ## 风险提示（Trade-offs）
//! - 构建过程是纯计算，重复构建只浪费 CPU，不影响正确性；
//! - `DashMap` guard 只在读取或发布的瞬间持有，构建期间不持锁。

use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, LazyLock},
};

use dashmap::{DashMap, mapref::entry::Entry};
use prost_reflect::{Kind, MessageDescriptor};
use tracing::debug;

use crate::{config::DefOptions, error::SchemaError, naming::Naming, value::Key};

use super::SchemaDef;

static GLOBAL: LazyLock<Arc<SchemaRegistry>> = LazyLock::new(SchemaRegistry::new);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct DefKey {
    message: MessageDescriptor,
    options: DefOptions,
}

/// 定义与逻辑名称的并发缓存。
///
/// # 教案式注释
/// - **意图 (Why)**：定义构建涉及字段选项解析与全图校验，只应发生一次；
/// - **契约 (What)**：`defs` 只增不减；`names` 驻留（命名策略, 线上名称）→ 逻辑键，
///   使同一名称在进程内共享同一份 `Key`；
/// - **风险 (Trade-offs)**：未提供淘汰策略，消息类型集合被假定为有限且稳定。
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    defs: DashMap<DefKey, Arc<SchemaDef>>,
    names: DashMap<(Naming, String), Key>,
}

impl SchemaRegistry {
    /// 创建隔离的注册表。
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 进程级注册表，首次使用时创建。
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// 获取（必要时构建）`message` 在 `options` 下的定义。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - 命中缓存时直接返回；
    ///   - 否则构建 `message` 及其可达嵌套类型中尚未缓存的定义，任一校验失败即返回
    ///     `SchemaError`，此时不发布任何定义；
    ///   - **后置条件**：成功返回后，同键的后续请求得到同一个 `Arc`。
    pub fn def_for(
        self: &Arc<Self>,
        message: &MessageDescriptor,
        options: &DefOptions,
    ) -> Result<Arc<SchemaDef>, SchemaError> {
        let key = DefKey {
            message: message.clone(),
            options: options.clone(),
        };
        if let Some(def) = self.defs.get(&key) {
            return Ok(Arc::clone(def.value()));
        }

        let mut pending = Vec::new();
        for descriptor in reachable(message) {
            let key = DefKey {
                message: descriptor,
                options: options.clone(),
            };
            if !self.defs.contains_key(&key) {
                let def = SchemaDef::build(self, &key.message, options)?;
                pending.push((key, def));
            }
        }

        let mut root = None;
        for (candidate, def) in pending {
            let is_root = candidate == key;
            let published = self.publish(candidate, def);
            if is_root {
                root = Some(published);
            }
        }

        Ok(root.unwrap_or_else(|| {
            self.defs
                .get(&key)
                .map(|def| Arc::clone(def.value()))
                .expect("a root skipped during the build was already cached")
        }))
    }

    fn publish(&self, key: DefKey, def: SchemaDef) -> Arc<SchemaDef> {
        match self.defs.entry(key) {
            Entry::Occupied(existing) => {
                debug!(
                    schema = existing.key().message.full_name(),
                    naming = existing.key().options.naming().id(),
                    "definition already published by a concurrent builder; reusing it"
                );
                Arc::clone(existing.get())
            }
            Entry::Vacant(slot) => {
                debug!(
                    schema = slot.key().message.full_name(),
                    naming = slot.key().options.naming().id(),
                    size_limit = slot.key().options.size_limit(),
                    "published schema definition"
                );
                Arc::clone(slot.insert(Arc::new(def)).value())
            }
        }
    }

    /// 驻留线上名称在 `naming` 下的逻辑键，先写者胜。
    pub fn intern(&self, naming: &Naming, wire_name: &str) -> Key {
        if let Some(key) = self.names.get(&(naming.clone(), wire_name.to_owned())) {
            return key.value().clone();
        }
        self.names
            .entry((naming.clone(), wire_name.to_owned()))
            .or_insert_with(|| naming.logical_key(wire_name))
            .value()
            .clone()
    }

    /// 已发布的定义数量。
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// `root` 及其经消息字段可达的全部类型，广度优先。
fn reachable(root: &MessageDescriptor) -> Vec<MessageDescriptor> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root.clone()]);
    let mut order = Vec::new();

    while let Some(message) = queue.pop_front() {
        if !seen.insert(message.clone()) {
            continue;
        }
        for field in message.fields() {
            if let Kind::Message(nested) = field.kind()
                && !seen.contains(&nested)
            {
                queue.push_back(nested);
            }
        }
        order.push(message);
    }
    order
}
