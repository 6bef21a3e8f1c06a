//! Bean 后处理器扩展点
//!
//! 每个扩展点是一个独立的能力 trait。后处理器只实现关心的能力，
//! 并通过 [`BeanPostProcessor`] 上对应的 `as_*` 方法声明出来。

use crate::definition::{BeanDefinition, PropertyValues};
use crate::factory::{BeanFactoryAware, CreationContext};
use crate::model::{BeanInstance, ComponentModel};
use infrastructure_common::{BeanResult, BoxError, LOWEST_PRECEDENCE};
use std::sync::Arc;

/// Bean 后处理器
pub trait BeanPostProcessor: Send + Sync {
    /// 名称，用于日志
    fn name(&self) -> &str;

    /// 执行顺序，数值小的先执行
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    fn as_initialization_aware(&self) -> Option<&dyn InitializationAware> {
        None
    }

    fn as_instantiation_aware(&self) -> Option<&dyn InstantiationAware> {
        None
    }

    fn as_smart_instantiation_aware(&self) -> Option<&dyn SmartInstantiationAware> {
        None
    }

    fn as_merged_definition_aware(&self) -> Option<&dyn MergedDefinitionAware> {
        None
    }

    fn as_destruction_aware(&self) -> Option<&dyn DestructionAware> {
        None
    }

    fn as_factory_aware(&self) -> Option<&dyn BeanFactoryAware> {
        None
    }
}

/// 初始化前后回调
///
/// 返回 `None` 表示"不变"：链条在此停止，沿用上一个处理器的结果
pub trait InitializationAware: Send + Sync {
    fn before_initialization(&self, bean: BeanInstance, _bean_name: &str) -> BeanResult<Option<BeanInstance>> {
        Ok(Some(bean))
    }

    fn after_initialization(&self, bean: BeanInstance, _bean_name: &str) -> BeanResult<Option<BeanInstance>> {
        Ok(Some(bean))
    }
}

/// 实例化前后回调
pub trait InstantiationAware: Send + Sync {
    /// 实例化前短路：返回的对象将直接作为 Bean，跳过常规创建流程
    fn before_instantiation(
        &self,
        _model: &Arc<dyn ComponentModel>,
        _bean_name: &str,
    ) -> BeanResult<Option<BeanInstance>> {
        Ok(None)
    }

    /// 实例化之后、属性填充之前；返回 `false` 跳过属性填充
    fn after_instantiation(&self, _bean: &BeanInstance, _bean_name: &str) -> BeanResult<bool> {
        Ok(true)
    }

    /// 处理属性值；返回 `None` 表示保持不变
    fn process_properties(
        &self,
        _property_values: &PropertyValues,
        _bean: &BeanInstance,
        _bean_name: &str,
        _ctx: &mut CreationContext,
    ) -> BeanResult<Option<PropertyValues>> {
        Ok(None)
    }
}

/// 类型预测、构造器候选与早期引用
pub trait SmartInstantiationAware: Send + Sync {
    /// 预测最终类型
    fn predict_bean_type(
        &self,
        _model: &Arc<dyn ComponentModel>,
        _bean_name: &str,
    ) -> Option<Arc<dyn ComponentModel>> {
        None
    }

    /// 候选构造器下标
    fn determine_candidate_constructors(
        &self,
        _model: &Arc<dyn ComponentModel>,
        _bean_name: &str,
    ) -> BeanResult<Option<Vec<usize>>> {
        Ok(None)
    }

    /// 为循环引用提供早期引用
    fn early_bean_reference(&self, bean: BeanInstance, _bean_name: &str) -> BeanResult<BeanInstance> {
        Ok(bean)
    }
}

/// 合并定义后处理
pub trait MergedDefinitionAware: Send + Sync {
    fn post_process_merged_definition(
        &self,
        definition: &BeanDefinition,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<()>;

    /// 定义被替换或移除时清理缓存
    fn reset_bean_definition(&self, _bean_name: &str) {}
}

/// 销毁前回调
pub trait DestructionAware: Send + Sync {
    fn before_destruction(&self, bean: &BeanInstance, bean_name: &str) -> Result<(), BoxError>;

    fn requires_destruction(&self, _bean: &BeanInstance) -> bool {
        true
    }
}
