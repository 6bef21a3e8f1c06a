//! Bean 工厂抽象接口
//!
//! [`BeanFactory`] 是对象安全的容器接口，可以作为 `Arc<dyn BeanFactory>` /
//! `Weak<dyn BeanFactory>` 交给协作者；泛型便捷方法在 [`BeanFactoryExt`] 中。

use crate::definition::DefinitionRegistry;
use crate::descriptor::DependencyDescriptor;
use crate::model::{BeanInstance, ComponentModel};
use crate::value::DynValue;
use infrastructure_common::{BeanError, BeanResult, BoxError, ContainerConfig, TypeInfo, TypeKey};
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// FactoryBean 解引用前缀
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// 是否为 FactoryBean 解引用名称
pub fn is_factory_dereference(name: &str) -> bool {
    name.starts_with(FACTORY_BEAN_PREFIX)
}

/// 去掉所有 FactoryBean 解引用前缀
pub fn transformed_bean_name(name: &str) -> &str {
    name.trim_start_matches(FACTORY_BEAN_PREFIX)
}

/// 创建上下文
///
/// 沿一次获取调用显式传递，记录本调用链中正在创建的原型 Bean，
/// 用于发现原型之间的循环依赖。
#[derive(Debug, Default)]
pub struct CreationContext {
    prototypes_in_creation: HashSet<String>,
}

impl CreationContext {
    /// 创建空上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记原型开始创建
    pub fn enter_prototype(&mut self, name: &str) -> BeanResult<()> {
        if !self.prototypes_in_creation.insert(name.to_string()) {
            return Err(BeanError::currently_in_creation(name));
        }
        Ok(())
    }

    /// 清除原型创建标记
    pub fn exit_prototype(&mut self, name: &str) {
        self.prototypes_in_creation.remove(name);
    }

    /// 原型是否正在创建
    pub fn is_prototype_in_creation(&self, name: &str) -> bool {
        self.prototypes_in_creation.contains(name)
    }
}

/// 依赖解析结果
#[derive(Debug, Clone)]
pub struct Resolved {
    /// 注入值
    pub value: DynValue,
    /// 实际使用的 Bean 名称
    pub bean_names: Vec<String>,
}

impl Resolved {
    /// 空结果
    pub fn null() -> Self {
        Self {
            value: DynValue::Null,
            bean_names: Vec::new(),
        }
    }

    /// 单个 Bean 结果
    pub fn bean(name: impl Into<String>, bean: BeanInstance) -> Self {
        Self {
            value: DynValue::Bean(bean),
            bean_names: vec![name.into()],
        }
    }
}

/// Bean 工厂 trait
pub trait BeanFactory: DefinitionRegistry {
    /// 按名称获取 Bean
    fn get_bean(&self, name: &str) -> BeanResult<BeanInstance> {
        self.get_bean_in(name, &mut CreationContext::new())
    }

    /// 在已有创建上下文中获取 Bean
    fn get_bean_in(&self, name: &str, ctx: &mut CreationContext) -> BeanResult<BeanInstance>;

    /// 是否包含定义或单例
    fn contains_bean(&self, name: &str) -> bool;

    /// 是否单例
    fn is_singleton(&self, name: &str) -> BeanResult<bool>;

    /// 是否原型
    fn is_prototype(&self, name: &str) -> BeanResult<bool>;

    /// Bean 能否作为指定类型使用
    fn is_type_match(&self, name: &str, key: TypeKey) -> BeanResult<bool>;

    /// Bean 的类型
    fn type_of(&self, name: &str) -> BeanResult<Option<TypeInfo>>;

    /// 全部匹配类型的 Bean 名称，按注册顺序
    fn bean_names_for_type(&self, key: TypeKey, include_non_singletons: bool, allow_eager_init: bool) -> Vec<String>;

    /// 解析依赖
    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
        ctx: &mut CreationContext,
    ) -> BeanResult<Resolved>;

    /// 单例是否正在创建
    fn is_currently_in_creation(&self, name: &str) -> bool;

    /// 登记依赖关系：`dependent` 依赖 `name`
    fn register_dependent_bean(&self, name: &str, dependent: &str);

    /// 容器配置
    fn config(&self) -> &ContainerConfig;

    /// 销毁非单例 Bean 实例
    fn destroy_bean(&self, name: &str, instance: &BeanInstance);
}

/// Bean 工厂泛型便捷方法
pub trait BeanFactoryExt: BeanFactory {
    /// 获取具体类型的 Bean
    fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> BeanResult<Arc<T>> {
        let bean = self.get_bean(name)?;
        bean.downcast::<T>().ok_or_else(|| BeanError::BeanNotOfRequiredType {
            bean_name: name.to_string(),
            required_type: std::any::type_name::<T>().to_string(),
            actual_type: bean.type_info().name.clone(),
        })
    }

    /// 获取 Bean 的类型视图
    fn get_as<U: ?Sized + 'static>(&self, name: &str) -> BeanResult<Arc<U>> {
        let bean = self.get_bean(name)?;
        bean.cast::<U>().ok_or_else(|| BeanError::BeanNotOfRequiredType {
            bean_name: name.to_string(),
            required_type: std::any::type_name::<U>().to_string(),
            actual_type: bean.type_info().name.clone(),
        })
    }

    /// 按类型获取唯一 Bean
    fn get_bean_of_type(&self, key: TypeKey) -> BeanResult<BeanInstance> {
        let descriptor = DependencyDescriptor::for_type(key);
        let resolved = self.resolve_dependency(&descriptor, None, &mut CreationContext::new())?;
        match resolved.value {
            DynValue::Bean(bean) => Ok(bean),
            _ => Err(BeanError::no_such_bean_of_type(key.name(), "没有匹配的 Bean")),
        }
    }

    /// 按类型获取唯一 Bean 的类型视图
    fn get_of_type<U: ?Sized + 'static>(&self) -> BeanResult<Arc<U>> {
        let bean = self.get_bean_of_type(TypeKey::of::<U>())?;
        bean.cast::<U>().ok_or_else(|| BeanError::BeanNotOfRequiredType {
            bean_name: bean.type_info().name.clone(),
            required_type: std::any::type_name::<U>().to_string(),
            actual_type: bean.type_info().name.clone(),
        })
    }

    /// 全部匹配类型的 Bean，按注册顺序
    fn beans_of_type(&self, key: TypeKey) -> BeanResult<Vec<(String, BeanInstance)>> {
        self.bean_names_for_type(key, true, true)
            .into_iter()
            .map(|name| {
                let bean = self.get_bean(&name)?;
                Ok((name, bean))
            })
            .collect()
    }
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {}

/// 工厂感知
///
/// 收到所属容器的弱引用，避免 Bean 与容器之间形成引用环
pub trait BeanFactoryAware: Send + Sync {
    fn set_bean_factory(&self, factory: Weak<dyn BeanFactory>);
}

/// FactoryBean
///
/// 自身作为 Bean 注册，对外暴露的是它生产的对象；`&name` 获取工厂本身
pub trait FactoryBean: Send + Sync {
    /// 生产对象
    fn get_object(&self) -> Result<BeanInstance, BoxError>;

    /// 产品的组件模型，未知时返回 `None`
    fn object_model(&self) -> Option<Arc<dyn ComponentModel>>;

    /// 产品是否单例
    fn is_singleton(&self) -> bool {
        true
    }
}

/// 单例全部预实例化后的回调
pub trait SmartInitializingSingleton: Send + Sync {
    fn after_singletons_instantiated(&self) -> Result<(), BoxError>;
}

/// 自定义作用域
pub trait Scope: Send + Sync {
    /// 获取作用域内的对象，不存在时通过 `factory` 创建
    fn get(
        &self,
        name: &str,
        factory: &mut dyn FnMut() -> BeanResult<BeanInstance>,
    ) -> BeanResult<BeanInstance>;

    /// 移除对象
    fn remove(&self, name: &str) -> Option<BeanInstance>;

    /// 登记销毁回调
    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send + Sync>);

    /// 会话标识
    fn conversation_id(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_transformation() {
        assert!(is_factory_dereference("&connectionFactory"));
        assert_eq!(transformed_bean_name("&&connectionFactory"), "connectionFactory");
        assert_eq!(transformed_bean_name("service"), "service");
    }

    #[test]
    fn test_prototype_reentry_is_rejected() {
        let mut ctx = CreationContext::new();
        ctx.enter_prototype("command").unwrap();
        let err = ctx.enter_prototype("command").unwrap_err();
        assert!(matches!(err, BeanError::CurrentlyInCreation { .. }));

        ctx.exit_prototype("command");
        assert!(!ctx.is_prototype_in_creation("command"));
        ctx.enter_prototype("command").unwrap();
    }
}
