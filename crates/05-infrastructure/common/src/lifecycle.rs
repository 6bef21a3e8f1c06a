//! 组件生命周期管理

use crate::errors::BoxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bean 作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeanScope {
    /// 单例模式 - 容器生命周期内每个名称只有一个共享实例
    Singleton,
    /// 原型模式 - 每次请求都创建新实例
    Prototype,
    /// 自定义作用域 - 由按名称注册的作用域实现管理
    Custom(String),
}

impl BeanScope {
    /// 是否单例
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton)
    }

    /// 是否原型
    pub fn is_prototype(&self) -> bool {
        matches!(self, Self::Prototype)
    }
}

impl Default for BeanScope {
    fn default() -> Self {
        Self::Singleton
    }
}

impl fmt::Display for BeanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => f.write_str("singleton"),
            Self::Prototype => f.write_str("prototype"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// 组件生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// 未初始化
    Uninitialized,
    /// 初始化中
    Initializing,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 错误状态
    Error,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

/// 可启停组件 trait
///
/// 容器刷新完成后由应用上下文按阶段启动，关闭时逆序停止
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// 组件启动
    async fn on_start(&self) -> Result<(), BoxError>;

    /// 组件停止
    async fn on_stop(&self) -> Result<(), BoxError>;

    /// 是否运行中
    fn is_running(&self) -> bool;

    /// 启动阶段，数值小的先启动、后停止
    fn phase(&self) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_defaults_to_singleton() {
        assert!(BeanScope::default().is_singleton());
        assert!(BeanScope::Prototype.is_prototype());
        assert_eq!(BeanScope::Custom("request".to_string()).to_string(), "request");
    }
}
