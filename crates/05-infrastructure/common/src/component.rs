//! Bean 能力接口定义
//!
//! Bean 实例从构造起就被共享（`Arc`），因此所有回调都接收 `&self`，
//! 需要修改状态的组件应使用内部可变性（`OnceLock`、`Mutex` 等）。

use crate::errors::BoxError;

/// 名称感知
///
/// 在属性填充之后、初始化之前收到自己在容器中的名称
pub trait BeanNameAware: Send + Sync {
    fn set_bean_name(&self, name: &str);
}

/// 初始化回调
///
/// 所有属性设置完成后调用
pub trait InitializingBean: Send + Sync {
    fn after_properties_set(&self) -> Result<(), BoxError>;
}

/// 销毁回调
///
/// 容器关闭或单例被移除时调用，错误只记录日志
pub trait DisposableBean: Send + Sync {
    fn destroy(&self) -> Result<(), BoxError>;
}

/// 最高执行顺序
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// 最低执行顺序
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;
