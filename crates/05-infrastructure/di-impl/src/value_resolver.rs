//! 属性值与构造器参数的解析
//!
//! 把定义中的 [`PropertyValue`] 解析为可以写入实例的 [`DynValue`]：
//! 引用会触发目标 Bean 的创建并登记依赖关系，内部定义会创建内部 Bean。

use crate::factory::DefaultBeanFactory;
use di_abstractions::{transformed_bean_name, BeanDefinition, BeanFactory, CreationContext, DynValue, PropertyValue};
use infrastructure_common::{BeanError, BeanResult, CreationPhase};
use tracing::trace;

/// 值解析器，绑定到一次 Bean 创建
pub(crate) struct ValueResolver<'a> {
    factory: &'a DefaultBeanFactory,
    bean_name: &'a str,
    definition: &'a BeanDefinition,
    phase: CreationPhase,
}

impl<'a> ValueResolver<'a> {
    pub(crate) fn new(
        factory: &'a DefaultBeanFactory,
        bean_name: &'a str,
        definition: &'a BeanDefinition,
        phase: CreationPhase,
    ) -> Self {
        Self {
            factory,
            bean_name,
            definition,
            phase,
        }
    }

    /// 解析一个值；`context` 描述值所在的位置，用于错误信息
    pub(crate) fn resolve(
        &self,
        context: &str,
        value: &PropertyValue,
        ctx: &mut CreationContext,
    ) -> BeanResult<DynValue> {
        match value {
            PropertyValue::Value(literal) => Ok(DynValue::Value(literal.clone())),
            PropertyValue::Resolved(resolved) => Ok(resolved.clone()),
            PropertyValue::Reference(target) => self.resolve_reference(context, target, ctx),
            PropertyValue::Inner(inner) => self.resolve_inner(context, inner, ctx),
            PropertyValue::List(items) => items
                .iter()
                .map(|item| self.resolve(context, item, ctx))
                .collect::<BeanResult<Vec<_>>>()
                .map(DynValue::List),
        }
    }

    fn resolve_reference(
        &self,
        context: &str,
        target: &str,
        ctx: &mut CreationContext,
    ) -> BeanResult<DynValue> {
        let bean = self.factory.get_bean_in(target, ctx).map_err(|err| {
            BeanError::creation_caused_by(
                self.bean_name,
                self.phase,
                format!("无法解析{}对 Bean '{}' 的引用", context, target),
                Box::new(err),
            )
        })?;
        self.factory
            .register_dependent_bean(transformed_bean_name(target), self.bean_name);
        Ok(DynValue::Bean(bean))
    }

    fn resolve_inner(
        &self,
        context: &str,
        inner: &BeanDefinition,
        ctx: &mut CreationContext,
    ) -> BeanResult<DynValue> {
        let mut merged = match &inner.parent {
            Some(parent) => {
                let parent_definition = self.factory.merged_bean_definition(parent).map_err(|err| {
                    BeanError::creation_caused_by(
                        self.bean_name,
                        self.phase,
                        format!("无法合并{}内部 Bean 的父定义 '{}'", context, parent),
                        Box::new(err),
                    )
                })?;
                inner.merge_with_parent(&parent_definition)
            }
            None => inner.clone(),
        };
        // 内部 Bean 不会比外部 Bean 活得更久
        if merged.is_singleton() && !self.definition.is_singleton() {
            merged.scope = Some(self.definition.effective_scope());
        }

        let type_name = merged
            .class
            .as_ref()
            .map_or_else(|| "inner".to_string(), |class| class.type_info().short_name().to_string());
        let inner_name = self.factory.next_inner_bean_name(&type_name);
        trace!("为 Bean '{}' 创建内部 Bean '{}'", self.bean_name, inner_name);

        let created = self
            .factory
            .create_bean(&inner_name, &merged, None, ctx)
            .map_err(|err| {
                BeanError::creation_caused_by(
                    self.bean_name,
                    self.phase,
                    format!("无法创建{}的内部 Bean '{}'", context, inner_name),
                    Box::new(err),
                )
            })?;
        if merged.is_singleton() {
            self.factory
                .registry()
                .register_contained_bean(&inner_name, self.bean_name);
        }
        let bean = self
            .factory
            .object_for_bean_instance(created, &inner_name, &inner_name)?;
        Ok(DynValue::Bean(bean))
    }
}
