//! 事务管理抽象

use infrastructure_common::TransactionResult;
use serde::{Deserialize, Serialize};

/// 事务传播行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// 加入当前事务，不存在时新建
    #[default]
    Required,
    /// 有事务则加入，否则非事务执行
    Supports,
    /// 必须存在事务
    Mandatory,
    /// 总是新建事务
    RequiresNew,
    /// 非事务执行
    NotSupported,
    /// 不允许存在事务
    Never,
    /// 嵌套事务
    Nested,
}

/// 事务隔离级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// 使用数据源默认级别
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// 事务定义
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionDefinition {
    /// 事务名称，通常为"类型.方法"
    pub name: String,
    /// 传播行为
    pub propagation: Propagation,
    /// 隔离级别
    pub isolation: Isolation,
    /// 超时秒数
    pub timeout_secs: Option<u64>,
    /// 是否只读
    pub read_only: bool,
}

/// 事务状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    /// 事务名称
    pub name: String,
    /// 是否新开启的事务
    pub new_transaction: bool,
    /// 是否已标记为仅回滚
    pub rollback_only: bool,
}

/// 事务管理器
///
/// 具体的提交、回滚机制由实现方负责
pub trait PlatformTransactionManager: Send + Sync {
    fn begin(&self, definition: &TransactionDefinition) -> TransactionResult<TransactionStatus>;

    fn commit(&self, status: TransactionStatus) -> TransactionResult<()>;

    fn rollback(&self, status: TransactionStatus) -> TransactionResult<()>;
}
