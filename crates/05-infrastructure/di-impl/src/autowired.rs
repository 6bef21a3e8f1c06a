//! 自动装配后处理器
//!
//! 根据组件模型上的自动装配标记决定候选构造器，并在属性处理阶段注入
//! 标记为自动装配的属性与方法。

use dashmap::DashMap;
use di_abstractions::{
    Args, BeanDefinition, BeanFactory, BeanFactoryAware, BeanInstance, BeanPostProcessor, ComponentModel,
    CreationContext, DependencyDescriptor, DynValue, InstantiationAware, MergedDefinitionAware, MethodInfo,
    PropertyInfo, PropertyValues, SmartInstantiationAware,
};
use infrastructure_common::{BeanError, BeanResult, CreationPhase, TypeKey, LOWEST_PRECEDENCE};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// 方法上的自动装配注解名称
pub const AUTOWIRED_ANNOTATION: &str = "autowired";

enum Member {
    Property(PropertyInfo),
    Method(MethodInfo),
}

/// 一个注入点及其快捷方式缓存
struct InjectedElement {
    member: Member,
    required: bool,
    /// 每个依赖解析到的唯一 Bean 名称
    shortcuts: Mutex<Option<Vec<Option<String>>>>,
}

impl InjectedElement {
    fn name(&self) -> &str {
        match &self.member {
            Member::Property(property) => &property.name,
            Member::Method(method) => &method.name,
        }
    }
}

/// 一个 Bean 的注入元数据
struct InjectionMetadata {
    elements: Vec<InjectedElement>,
}

impl InjectionMetadata {
    fn build(model: &dyn ComponentModel) -> Self {
        let mut elements = Vec::new();
        for property in model.properties() {
            if let Some(autowired) = property.autowired {
                elements.push(InjectedElement {
                    member: Member::Property(property.clone()),
                    required: autowired.required,
                    shortcuts: Mutex::new(None),
                });
            }
        }
        for method in model.methods() {
            let Some(annotation) = method.annotations.find(AUTOWIRED_ANNOTATION) else {
                continue;
            };
            let required = annotation
                .attributes
                .get("required")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true);
            elements.push(InjectedElement {
                member: Member::Method(method.clone()),
                required,
                shortcuts: Mutex::new(None),
            });
        }
        Self { elements }
    }

    fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// 自动装配后处理器
pub struct AutowiredPostProcessor {
    factory: RwLock<Option<Weak<dyn BeanFactory>>>,
    candidate_constructors: DashMap<TypeKey, Option<Vec<usize>>>,
    injection_metadata: DashMap<String, Arc<InjectionMetadata>>,
}

impl AutowiredPostProcessor {
    /// 创建处理器
    pub fn new() -> Self {
        Self {
            factory: RwLock::new(None),
            candidate_constructors: DashMap::new(),
            injection_metadata: DashMap::new(),
        }
    }

    fn factory(&self, bean_name: &str) -> BeanResult<Arc<dyn BeanFactory>> {
        self.factory
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                BeanError::creation(
                    bean_name,
                    CreationPhase::PopulateProperties,
                    "自动装配处理器尚未绑定 Bean 工厂",
                )
            })
    }

    fn metadata_for(&self, bean_name: &str, model: &dyn ComponentModel) -> Arc<InjectionMetadata> {
        self.injection_metadata
            .entry(bean_name.to_string())
            .or_insert_with(|| Arc::new(InjectionMetadata::build(model)))
            .value()
            .clone()
    }

    fn inject_property(
        &self,
        factory: &dyn BeanFactory,
        element: &InjectedElement,
        property: &PropertyInfo,
        bean: &BeanInstance,
        bean_name: &str,
        ctx: &mut CreationContext,
    ) -> BeanResult<()> {
        let descriptor = DependencyDescriptor::for_property(bean.type_info(), property, element.required);
        let cached = element
            .shortcuts
            .lock()
            .as_ref()
            .and_then(|shortcuts| shortcuts.first().cloned().flatten());
        let descriptor = match cached {
            Some(shortcut) => descriptor.with_shortcut(shortcut),
            None => descriptor,
        };

        let resolved = factory
            .resolve_dependency(&descriptor, Some(bean_name), ctx)
            .map_err(|err| BeanError::UnsatisfiedDependency {
                bean_name: bean_name.to_string(),
                injection_point: descriptor.describe(),
                source: Box::new(err),
            })?;
        cache_shortcuts(element, &[(property.multiple, &resolved.bean_names)]);
        if resolved.value.is_null() {
            trace!("可选属性 '{}' 没有候选，跳过", property.name);
            return Ok(());
        }

        debug!("自动装配属性: '{}'.{} -> {:?}", bean_name, property.name, resolved.bean_names);
        bean.set_property(&property.name, resolved.value).map_err(|err| {
            BeanError::creation_caused_by(
                bean_name,
                CreationPhase::PopulateProperties,
                format!("注入属性 '{}' 失败", property.name),
                err,
            )
        })
    }

    fn inject_method(
        &self,
        factory: &dyn BeanFactory,
        element: &InjectedElement,
        method: &MethodInfo,
        bean: &BeanInstance,
        bean_name: &str,
        ctx: &mut CreationContext,
    ) -> BeanResult<()> {
        let cached = element.shortcuts.lock().clone();
        let mut args = Args::empty();
        let mut resolved_names = Vec::with_capacity(method.params.len());
        for (index, param) in method.params.iter().enumerate() {
            let mut descriptor = DependencyDescriptor::for_parameter(bean.type_info(), &method.name, index, param);
            descriptor.required = param.required && element.required;
            if let Some(Some(shortcut)) = cached.as_ref().and_then(|shortcuts| shortcuts.get(index)) {
                descriptor = descriptor.with_shortcut(shortcut.clone());
            }
            let resolved = factory
                .resolve_dependency(&descriptor, Some(bean_name), ctx)
                .map_err(|err| BeanError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: descriptor.describe(),
                    source: Box::new(err),
                })?;
            if resolved.value.is_null() && !param.required {
                args.push(DynValue::Null);
            } else if resolved.value.is_null() {
                trace!("方法 '{}' 的依赖不完整，跳过调用", method.name);
                return Ok(());
            } else {
                args.push(resolved.value);
            }
            resolved_names.push((param.multiple, resolved.bean_names));
        }

        let names: Vec<(bool, &Vec<String>)> = resolved_names.iter().map(|(multiple, names)| (*multiple, names)).collect();
        cache_shortcuts(element, &names);
        debug!("调用自动装配方法: '{}'.{}", bean_name, method.name);
        bean.invoke(&method.name, args).map(|_| ()).map_err(|err| {
            BeanError::creation_caused_by(
                bean_name,
                CreationPhase::PopulateProperties,
                format!("自动装配方法 '{}' 失败", method.name),
                err,
            )
        })
    }
}

/// 每个依赖恰好解析到一个 Bean 时记下它的名称；集合依赖不缓存
fn cache_shortcuts(element: &InjectedElement, resolved: &[(bool, &Vec<String>)]) {
    let mut shortcuts = element.shortcuts.lock();
    if shortcuts.is_some() {
        return;
    }
    let cached: Vec<Option<String>> = resolved
        .iter()
        .map(|(multiple, names)| match names.as_slice() {
            [single] if !*multiple => Some(single.clone()),
            _ => None,
        })
        .collect();
    if cached.iter().any(Option::is_some) {
        *shortcuts = Some(cached);
    }
}

impl Default for AutowiredPostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanPostProcessor for AutowiredPostProcessor {
    fn name(&self) -> &str {
        "AutowiredPostProcessor"
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE - 2
    }

    fn as_instantiation_aware(&self) -> Option<&dyn InstantiationAware> {
        Some(self)
    }

    fn as_smart_instantiation_aware(&self) -> Option<&dyn SmartInstantiationAware> {
        Some(self)
    }

    fn as_merged_definition_aware(&self) -> Option<&dyn MergedDefinitionAware> {
        Some(self)
    }

    fn as_factory_aware(&self) -> Option<&dyn BeanFactoryAware> {
        Some(self)
    }
}

impl BeanFactoryAware for AutowiredPostProcessor {
    fn set_bean_factory(&self, factory: Weak<dyn BeanFactory>) {
        *self.factory.write() = Some(factory);
    }
}

impl SmartInstantiationAware for AutowiredPostProcessor {
    fn determine_candidate_constructors(
        &self,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<Vec<usize>>> {
        let key = model.type_info().key;
        if let Some(cached) = self.candidate_constructors.get(&key) {
            return Ok(cached.value().clone());
        }

        let constructors = model.constructors();
        let mut candidates = Vec::new();
        let mut required_index = None;
        let mut default_index = None;
        for (index, constructor) in constructors.iter().enumerate() {
            if constructor.is_default() {
                default_index = Some(index);
            }
            let Some(autowired) = constructor.autowired else {
                continue;
            };
            if required_index.is_some() || (autowired.required && !candidates.is_empty()) {
                return Err(BeanError::creation(
                    bean_name,
                    CreationPhase::Instantiation,
                    format!(
                        "{} 的自动装配构造器无效: 已存在必需的自动装配构造器时不能再标记其他构造器",
                        model.type_info()
                    ),
                ));
            }
            if autowired.required {
                required_index = Some(index);
            }
            candidates.push(index);
        }

        let result = if !candidates.is_empty() {
            if required_index.is_none() {
                if let Some(default_index) = default_index {
                    if !candidates.contains(&default_index) {
                        candidates.push(default_index);
                    }
                }
            }
            Some(candidates)
        } else if constructors.len() == 1 && !constructors[0].is_default() {
            Some(vec![0])
        } else {
            None
        };
        trace!("{} 的候选构造器: {:?}", model.type_info(), result);
        self.candidate_constructors.insert(key, result.clone());
        Ok(result)
    }
}

impl MergedDefinitionAware for AutowiredPostProcessor {
    fn post_process_merged_definition(
        &self,
        _definition: &BeanDefinition,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<()> {
        let metadata = self.metadata_for(bean_name, model.as_ref());
        if !metadata.is_empty() {
            trace!(
                "Bean '{}' 的注入点: {:?}",
                bean_name,
                metadata.elements.iter().map(InjectedElement::name).collect::<Vec<_>>()
            );
        }
        Ok(())
    }

    fn reset_bean_definition(&self, bean_name: &str) {
        self.injection_metadata.remove(bean_name);
    }
}

impl InstantiationAware for AutowiredPostProcessor {
    fn process_properties(
        &self,
        property_values: &PropertyValues,
        bean: &BeanInstance,
        bean_name: &str,
        ctx: &mut CreationContext,
    ) -> BeanResult<Option<PropertyValues>> {
        let metadata = self.metadata_for(bean_name, bean.model().as_ref());
        if metadata.is_empty() {
            return Ok(None);
        }
        let factory = self.factory(bean_name)?;
        for element in &metadata.elements {
            match &element.member {
                Member::Property(property) => {
                    if property_values.contains(&property.name) {
                        continue;
                    }
                    self.inject_property(factory.as_ref(), element, property, bean, bean_name, ctx)?;
                }
                Member::Method(method) => {
                    self.inject_method(factory.as_ref(), element, method, bean, bean_name, ctx)?;
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_model::BeanClass;
    use crate::factory::DefaultBeanFactory;
    use di_abstractions::{Autowired, BeanFactoryExt, DefinitionRegistry, ParameterInfo};
    use infrastructure_common::{Annotation, ContainerConfig};

    struct Repository;

    struct Service {
        repository: Mutex<Option<Arc<Repository>>>,
        audit: Mutex<Option<Arc<Repository>>>,
    }

    fn repository_model() -> Arc<dyn ComponentModel> {
        BeanClass::<Repository>::builder()
            .default_constructor(|| Repository)
            .build()
    }

    fn factory_with_processor() -> Arc<DefaultBeanFactory> {
        let factory = DefaultBeanFactory::new(ContainerConfig::default());
        factory.add_post_processor(Arc::new(AutowiredPostProcessor::new()));
        factory
    }

    #[test]
    fn test_property_and_method_injection() {
        let factory = factory_with_processor();
        factory
            .register_definition("repository", BeanDefinition::new(repository_model()))
            .unwrap();
        let mut setter = MethodInfo::named("set_audit");
        setter.params.push(ParameterInfo::of::<Repository>("audit"));
        setter.annotations.push(Annotation::marker(AUTOWIRED_ANNOTATION));
        let model = BeanClass::<Service>::builder()
            .default_constructor(|| Service {
                repository: Mutex::new(None),
                audit: Mutex::new(None),
            })
            .autowired_property::<Repository, _>("repository", Autowired::REQUIRED, |service, value| {
                *service.repository.lock() = value.downcast::<Repository>();
                Ok(())
            })
            .method_with(setter, |service, args| {
                *service.audit.lock() = Some(args.bean::<Repository>(0)?);
                Ok(DynValue::Null)
            })
            .build();
        factory.register_definition("service", BeanDefinition::new(model)).unwrap();

        let service = factory.get_typed::<Service>("service").unwrap();
        let repository = factory.get_typed::<Repository>("repository").unwrap();
        assert!(Arc::ptr_eq(service.repository.lock().as_ref().unwrap(), &repository));
        assert!(Arc::ptr_eq(service.audit.lock().as_ref().unwrap(), &repository));
        assert_eq!(factory.registry().dependent_beans("repository"), vec!["service".to_string()]);
    }

    #[test]
    fn test_missing_required_property_is_unsatisfied() {
        let factory = factory_with_processor();
        let model = BeanClass::<Service>::builder()
            .default_constructor(|| Service {
                repository: Mutex::new(None),
                audit: Mutex::new(None),
            })
            .autowired_property::<Repository, _>("repository", Autowired::REQUIRED, |_, _| Ok(()))
            .build();
        factory.register_definition("service", BeanDefinition::new(model)).unwrap();

        let err = factory.get_bean("service").unwrap_err();
        assert!(matches!(err, BeanError::UnsatisfiedDependency { ref bean_name, .. } if bean_name == "service"));
    }

    #[test]
    fn test_optional_property_left_untouched() {
        let factory = factory_with_processor();
        let model = BeanClass::<Service>::builder()
            .default_constructor(|| Service {
                repository: Mutex::new(None),
                audit: Mutex::new(None),
            })
            .autowired_property::<Repository, _>("repository", Autowired::OPTIONAL, |_, _| {
                Err("不应写入".into())
            })
            .build();
        factory.register_definition("service", BeanDefinition::new(model)).unwrap();

        let service = factory.get_typed::<Service>("service").unwrap();
        assert!(service.repository.lock().is_none());
    }

    struct Client {
        params: usize,
    }

    #[test]
    fn test_lone_parameterised_constructor_is_candidate() {
        let factory = factory_with_processor();
        factory
            .register_definition("repository", BeanDefinition::new(repository_model()))
            .unwrap();
        let model = BeanClass::<Client>::builder()
            .constructor(vec![ParameterInfo::of::<Repository>("repository")], |args| {
                args.bean::<Repository>(0)?;
                Ok(Client { params: 1 })
            })
            .build();
        factory.register_definition("client", BeanDefinition::new(model)).unwrap();

        assert_eq!(factory.get_typed::<Client>("client").unwrap().params, 1);
    }

    #[test]
    fn test_greediest_satisfiable_optional_constructor_wins() {
        struct Missing;
        let factory = factory_with_processor();
        factory
            .register_definition("repository", BeanDefinition::new(repository_model()))
            .unwrap();
        let model = BeanClass::<Client>::builder()
            .default_constructor(|| Client { params: 0 })
            .autowired_constructor(
                vec![ParameterInfo::of::<Repository>("repository")],
                Autowired::OPTIONAL,
                |_| Ok(Client { params: 1 }),
            )
            .autowired_constructor(
                vec![
                    ParameterInfo::of::<Repository>("repository"),
                    ParameterInfo::of::<Missing>("missing"),
                ],
                Autowired::OPTIONAL,
                |_| Ok(Client { params: 2 }),
            )
            .build();
        factory.register_definition("client", BeanDefinition::new(model)).unwrap();

        assert_eq!(factory.get_typed::<Client>("client").unwrap().params, 1);
    }

    #[test]
    fn test_required_constructor_with_other_marked_is_rejected() {
        let processor = AutowiredPostProcessor::new();
        let model = BeanClass::<Client>::builder()
            .autowired_constructor(vec![ParameterInfo::of::<Repository>("a")], Autowired::REQUIRED, |_| {
                Ok(Client { params: 1 })
            })
            .autowired_constructor(vec![], Autowired::OPTIONAL, |_| Ok(Client { params: 0 }))
            .build();

        assert!(processor.determine_candidate_constructors(&model, "client").is_err());
    }
}
