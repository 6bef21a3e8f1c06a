//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn IoC 容器各层共享的基础类型。
//!
//! ## 核心内容
//!
//! - [`BeanError`] - 容器错误分类
//! - [`TypeKey`] / [`TypeInfo`] - 类型匹配所用的类型元数据
//! - [`InitializingBean`] / [`DisposableBean`] / [`BeanNameAware`] - Bean 能力接口
//! - [`BeanScope`] / [`Lifecycle`] - 作用域与启停生命周期
//! - [`ContainerConfig`] - 容器配置
//!
//! ## 设计原则
//!
//! - 容器实例显式传递，不使用进程级全局注册表
//! - 每种扩展能力是独立的 trait，按需实现
//! - 错误显式返回，销毁阶段的错误只记录不传播

pub mod component;
pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use component::*;
pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
