//! # config 模块说明
//!
//! ## 角色定位（Why）
//! - 定义在构建时需要确定的全部参数：命名策略与消息大小上限；
//! - `DefOptions` 整体参与注册表的缓存键，同一消息类型在不同配置下拥有互不干扰的定义。
//!
//! ## 契约（What）
//! - 默认配置：[`Naming::protobuf`] + [`DEFAULT_SIZE_LIMIT`]；
//! - 嵌套消息的定义沿用父定义的同一份 `DefOptions`。

use crate::naming::Naming;

/// 默认消息大小上限（64 MiB），与常见 Protobuf 运行时的输入流默认值保持一致。
pub const DEFAULT_SIZE_LIMIT: usize = 64 << 20;

/// 构建 `SchemaDef` 时使用的配置。
///
/// # 教案式说明
/// - **意图 (Why)**：把“如何命名”“允许多大”两个维度收拢为一个值类型，便于作为缓存键整体比较；
/// - **契约 (What)**：`Eq`/`Hash` 基于命名策略身份与大小上限；
/// - **使用方式 (How)**：链式调用 `with_*` 覆盖默认值。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DefOptions {
    naming: Naming,
    size_limit: usize,
}

impl DefOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换命名策略。
    pub fn with_naming(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }

    /// 替换消息大小上限（字节）。
    pub fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    #[inline]
    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    #[inline]
    pub fn size_limit(&self) -> usize {
        self.size_limit
    }
}

impl Default for DefOptions {
    fn default() -> Self {
        Self {
            naming: Naming::protobuf(),
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_differ_by_naming_and_limit() {
        let base = DefOptions::new();
        assert_eq!(base.size_limit(), DEFAULT_SIZE_LIMIT);
        assert_ne!(base, base.clone().with_naming(Naming::convert_underscores()));
        assert_ne!(base, base.clone().with_size_limit(1024));
        assert_eq!(base, DefOptions::default());
    }
}
