//! # 依赖注入具体实现
//!
//! 提供 Bean 工厂、单例注册表、依赖解析器、后处理器链、自动代理与声明式事务的实现。
//!
//! ## 主要组件
//!
//! - [`DefaultBeanFactory`] - Bean 工厂，负责定义管理、创建流程与作用域分派
//! - [`SingletonRegistry`] - 三级缓存的单例注册表，维护依赖关系并按序销毁
//! - [`PostProcessorChain`] - 按能力分类缓存的有序后处理器链
//! - [`AutowiredPostProcessor`] - 基于自动装配标记的注入
//! - [`aop::AutoProxyCreator`] - 自动代理创建器
//! - [`transaction::TransactionInterceptor`] - 声明式事务拦截器
//! - [`BeanClass`] - 基于构建器的默认组件模型

pub mod aop;
pub mod autowired;
pub mod component_model;
pub mod constructor_resolver;
pub mod definition_store;
pub mod disposable;
pub mod factory;
pub mod post_processors;
pub mod scope;
pub mod singleton_registry;
pub mod transaction;

mod resolver;
mod value_resolver;

pub use autowired::{AutowiredPostProcessor, AUTOWIRED_ANNOTATION};
pub use component_model::{BeanClass, BeanClassBuilder};
pub use constructor_resolver::ResolvedArguments;
pub use definition_store::DefinitionStore;
pub use disposable::DisposableBeanAdapter;
pub use factory::DefaultBeanFactory;
pub use post_processors::PostProcessorChain;
pub use scope::MapScope;
pub use singleton_registry::{SingletonFactory, SingletonRegistry};
