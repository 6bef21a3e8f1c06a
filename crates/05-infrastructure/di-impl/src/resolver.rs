//! 依赖解析
//!
//! 按类型查找候选 Bean，再依次用名称或限定符、首选标记、优先级缩小范围。
//! 解析用到的每个 Bean 都会登记为请求方的依赖。

use crate::factory::DefaultBeanFactory;
use di_abstractions::{
    transformed_bean_name, BeanFactory, CreationContext, DefinitionRegistry, DependencyDescriptor,
    DynValue, Resolved,
};
use infrastructure_common::{BeanError, BeanResult};
use tracing::trace;

const PRIMARY_ANNOTATION: &str = "primary";
const PRIORITY_ANNOTATION: &str = "priority";
const QUALIFIER_ANNOTATION: &str = "qualifier";

/// 依赖解析器
pub(crate) struct DependencyResolver<'a> {
    factory: &'a DefaultBeanFactory,
}

impl<'a> DependencyResolver<'a> {
    pub(crate) fn new(factory: &'a DefaultBeanFactory) -> Self {
        Self { factory }
    }

    pub(crate) fn resolve(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
        ctx: &mut CreationContext,
    ) -> BeanResult<Resolved> {
        if let Some(shortcut) = &descriptor.shortcut {
            if let Some(resolved) = self.resolve_shortcut(descriptor, shortcut, requesting_bean, ctx)? {
                return Ok(resolved);
            }
        }

        let candidates = self.find_candidates(descriptor, requesting_bean);
        trace!(
            "{} 的候选 Bean: {:?}",
            descriptor.describe(),
            candidates
        );
        if descriptor.multiple {
            return self.resolve_multiple(descriptor, candidates, requesting_bean, ctx);
        }

        let chosen = match candidates.as_slice() {
            [] => {
                if descriptor.required {
                    return Err(BeanError::no_such_bean_of_type(
                        descriptor.dependency_type.name(),
                        format!("{} 需要至少一个候选 Bean", descriptor.describe()),
                    ));
                }
                return Ok(Resolved::null());
            }
            [single] => single.clone(),
            _ => self.determine_autowire_candidate(descriptor, &candidates)?,
        };

        let bean = self.factory.get_bean_in(&chosen, ctx)?;
        self.register_dependencies(requesting_bean, std::slice::from_ref(&chosen));
        Ok(Resolved::bean(chosen, bean))
    }

    /// 快捷方式只有在仍然存在且类型匹配时才使用
    fn resolve_shortcut(
        &self,
        descriptor: &DependencyDescriptor,
        shortcut: &str,
        requesting_bean: Option<&str>,
        ctx: &mut CreationContext,
    ) -> BeanResult<Option<Resolved>> {
        let valid = !descriptor.multiple
            && self.factory.contains_bean(shortcut)
            && self
                .factory
                .is_type_match(shortcut, descriptor.dependency_type)
                .unwrap_or(false);
        if !valid {
            trace!("快捷方式 '{}' 已失效，重新解析 {}", shortcut, descriptor.describe());
            return Ok(None);
        }
        let bean = self.factory.get_bean_in(shortcut, ctx)?;
        self.register_dependencies(requesting_bean, &[shortcut.to_string()]);
        Ok(Some(Resolved::bean(shortcut, bean)))
    }

    fn resolve_multiple(
        &self,
        descriptor: &DependencyDescriptor,
        candidates: Vec<String>,
        requesting_bean: Option<&str>,
        ctx: &mut CreationContext,
    ) -> BeanResult<Resolved> {
        if candidates.is_empty() {
            if descriptor.required {
                return Err(BeanError::no_such_bean_of_type(
                    descriptor.dependency_type.name(),
                    format!("{} 需要至少一个候选 Bean", descriptor.describe()),
                ));
            }
            return Ok(Resolved::null());
        }

        let mut entries = Vec::with_capacity(candidates.len());
        for name in candidates {
            let bean = self.factory.get_bean_in(&name, ctx)?;
            let priority = self.priority(&name);
            entries.push((name, bean, priority));
        }
        entries.sort_by(|a, b| b.2.cmp(&a.2));

        let bean_names: Vec<String> = entries.iter().map(|(name, _, _)| name.clone()).collect();
        self.register_dependencies(requesting_bean, &bean_names);
        Ok(Resolved {
            value: DynValue::List(entries.into_iter().map(|(_, bean, _)| DynValue::Bean(bean)).collect()),
            bean_names,
        })
    }

    fn find_candidates(&self, descriptor: &DependencyDescriptor, requesting_bean: Option<&str>) -> Vec<String> {
        let names = self
            .factory
            .bean_names_for_type(descriptor.dependency_type, true, descriptor.eager);
        let mut result = Vec::new();
        let mut self_references = Vec::new();
        for name in names {
            if !self.is_autowire_candidate(&name, descriptor) {
                continue;
            }
            if requesting_bean.map_or(false, |requesting| self.is_self_reference(requesting, &name)) {
                self_references.push(name);
                continue;
            }
            result.push(name);
        }
        if result.is_empty() && !descriptor.multiple {
            result = self_references;
        }
        result
    }

    fn is_self_reference(&self, requesting_bean: &str, candidate: &str) -> bool {
        let requesting = self.factory.canonical_name(requesting_bean);
        let candidate = self.factory.canonical_name(transformed_bean_name(candidate));
        if requesting == candidate {
            return true;
        }
        self.factory
            .definition(&candidate)
            .and_then(|definition| definition.factory_bean_name.clone())
            .map_or(false, |factory_bean| self.factory.canonical_name(&factory_bean) == requesting)
    }

    fn is_autowire_candidate(&self, name: &str, descriptor: &DependencyDescriptor) -> bool {
        let bean_name = transformed_bean_name(name);
        let definition = self.factory.merged_bean_definition(bean_name).ok();
        if let Some(definition) = &definition {
            if !definition.autowire_candidate {
                return false;
            }
        }
        let Some(qualifier) = &descriptor.qualifier else {
            return true;
        };
        if bean_name == qualifier || self.factory.aliases(bean_name).contains(qualifier) {
            return true;
        }
        definition.map_or(false, |definition| {
            definition.qualifiers.contains(qualifier)
                || definition.class.as_ref().map_or(false, |class| {
                    class
                        .annotations()
                        .find(QUALIFIER_ANNOTATION)
                        .and_then(|annotation| annotation.str_attribute("value"))
                        == Some(qualifier.as_str())
                })
        })
    }

    /// 多个候选时的取舍：名称匹配、唯一首选、最高优先级
    fn determine_autowire_candidate(
        &self,
        descriptor: &DependencyDescriptor,
        candidates: &[String],
    ) -> BeanResult<String> {
        if let Some(name) = &descriptor.name {
            if let Some(matched) = candidates.iter().find(|candidate| self.matches_bean_name(candidate, name)) {
                return Ok(matched.clone());
            }
        }

        let primaries: Vec<String> = candidates
            .iter()
            .filter(|candidate| self.is_primary(candidate))
            .cloned()
            .collect();
        match primaries.len() {
            1 => return Ok(primaries[0].clone()),
            0 => {}
            _ => {
                return Err(BeanError::NoUniqueBeanDefinition {
                    required_type: descriptor.dependency_type.name().to_string(),
                    candidates: primaries,
                })
            }
        }

        let prioritized: Vec<(String, i32)> = candidates
            .iter()
            .filter_map(|candidate| self.priority(candidate).map(|priority| (candidate.clone(), priority)))
            .collect();
        if let Some(highest) = prioritized.iter().map(|(_, priority)| *priority).max() {
            let top: Vec<String> = prioritized
                .into_iter()
                .filter(|(_, priority)| *priority == highest)
                .map(|(name, _)| name)
                .collect();
            if top.len() == 1 {
                return Ok(top[0].clone());
            }
            return Err(BeanError::NoUniqueBeanDefinition {
                required_type: descriptor.dependency_type.name().to_string(),
                candidates: top,
            });
        }

        Err(BeanError::NoUniqueBeanDefinition {
            required_type: descriptor.dependency_type.name().to_string(),
            candidates: candidates.to_vec(),
        })
    }

    fn matches_bean_name(&self, candidate: &str, name: &str) -> bool {
        let bean_name = transformed_bean_name(candidate);
        bean_name == name || self.factory.aliases(bean_name).iter().any(|alias| alias == name)
    }

    fn is_primary(&self, name: &str) -> bool {
        self.factory
            .merged_bean_definition(transformed_bean_name(name))
            .map_or(false, |definition| {
                definition.primary
                    || definition
                        .class
                        .as_ref()
                        .map_or(false, |class| class.annotations().has(PRIMARY_ANNOTATION))
            })
    }

    fn priority(&self, name: &str) -> Option<i32> {
        let definition = self
            .factory
            .merged_bean_definition(transformed_bean_name(name))
            .ok()?;
        definition.priority.or_else(|| {
            definition
                .class
                .as_ref()?
                .annotations()
                .find(PRIORITY_ANNOTATION)?
                .attributes
                .get("value")?
                .as_i64()
                .and_then(|value| i32::try_from(value).ok())
        })
    }

    fn register_dependencies(&self, requesting_bean: Option<&str>, bean_names: &[String]) {
        let Some(requesting) = requesting_bean else {
            return;
        };
        for name in bean_names {
            self.factory
                .register_dependent_bean(transformed_bean_name(name), requesting);
        }
    }
}
