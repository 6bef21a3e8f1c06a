//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义容器与协作者之间的核心接口。
//!
//! ## 核心接口
//!
//! - [`ComponentModel`] / [`BeanInstance`] - 组件模型与 Bean 实例
//! - [`BeanDefinition`] / [`DefinitionRegistry`] - Bean 定义与定义存储
//! - [`DependencyDescriptor`] - 注入点描述
//! - [`BeanFactory`] / [`BeanFactoryExt`] - 容器接口
//! - [`BeanPostProcessor`] - 后处理器及其能力 trait
//! - [`Advisor`] / [`MethodInterceptor`] / [`AopProxyFactory`] - AOP 契约
//! - [`PlatformTransactionManager`] - 事务管理器契约

pub mod aop;
pub mod definition;
pub mod descriptor;
pub mod factory;
pub mod model;
pub mod processor;
pub mod transaction;
pub mod value;

pub use aop::*;
pub use definition::*;
pub use descriptor::*;
pub use factory::*;
pub use model::*;
pub use processor::*;
pub use transaction::*;
pub use value::*;
