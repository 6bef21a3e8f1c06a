//! Bean 创建流程
//!
//! 实例化前短路、实例化、合并定义后处理、早期引用暴露、属性填充、
//! 初始化、循环引用校验、销毁回调注册。

use super::DefaultBeanFactory;
use crate::constructor_resolver::{ConstructorResolver, ResolvedArguments};
use crate::disposable::DisposableBeanAdapter;
use crate::value_resolver::ValueResolver;
use di_abstractions::{
    Args, AutowireMode, BeanDefinition, BeanFactory, BeanFactoryAware, BeanInstance, ConstructorInfo,
    CreationContext, DependencyDescriptor, DynValue, PropertyInfo, PropertyValue, PropertyValues,
};
use infrastructure_common::{
    BeanError, BeanNameAware, BeanResult, BeanScope, CreationPhase, InitializingBean, TypeKey,
};
use tracing::{debug, trace, warn};

const AFTER_PROPERTIES_SET: &str = "after_properties_set";

impl DefaultBeanFactory {
    /// 创建 Bean：先给实例化感知处理器短路的机会
    pub(crate) fn create_bean(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        args: Option<Args>,
        ctx: &mut CreationContext,
    ) -> BeanResult<BeanInstance> {
        trace!("创建 Bean 实例: {}", bean_name);
        if let Some(class) = &definition.class {
            let can_short_circuit = !definition.uses_factory_method()
                && definition.instance_supplier.is_none()
                && self.post_processors.has_instantiation_aware();
            if can_short_circuit {
                let provided = self
                    .post_processors
                    .apply_before_instantiation(class, bean_name)
                    .map_err(|err| wrap_phase(bean_name, CreationPhase::BeforeInstantiation, err))?;
                if let Some(bean) = provided {
                    return self
                        .post_processors
                        .apply_after_initialization(bean, bean_name)
                        .map_err(|err| wrap_phase(bean_name, CreationPhase::BeforeInstantiation, err));
                }
            }
        }
        self.do_create_bean(bean_name, definition, args, ctx)
    }

    fn do_create_bean(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        args: Option<Args>,
        ctx: &mut CreationContext,
    ) -> BeanResult<BeanInstance> {
        let instance = self.create_bean_instance(bean_name, definition, args, ctx)?;
        let model = instance.model().clone();

        if !self.merged_definition_processed.contains(bean_name) {
            self.post_processors
                .apply_merged_definition(definition, &model, bean_name)
                .map_err(|err| wrap_phase(bean_name, CreationPhase::MergedDefinition, err))?;
            self.merged_definition_processed.insert(bean_name.to_string());
        }

        let early_exposure = definition.is_singleton()
            && self.config.allow_circular_references
            && self.registry.is_currently_in_creation(bean_name);
        if early_exposure {
            trace!("提前暴露 Bean '{}' 的引用以解决循环依赖", bean_name);
            let factory = self.self_weak();
            let raw = instance.clone();
            let name = bean_name.to_string();
            self.registry.add_singleton_factory(
                bean_name,
                Box::new(move || {
                    let factory = factory
                        .upgrade()
                        .ok_or_else(|| BeanError::CreationNotAllowed { bean_name: name.clone() })?;
                    factory.post_processors.early_bean_reference(raw, &name)
                }),
            );
        }

        self.populate_bean(bean_name, definition, &instance, ctx)
            .map_err(|err| wrap_phase(bean_name, CreationPhase::PopulateProperties, err))?;
        let mut exposed = self
            .initialize(bean_name, instance.clone(), Some(definition))
            .map_err(|err| wrap_phase(bean_name, CreationPhase::Initialization, err))?;

        if early_exposure {
            exposed = self.reconcile_early_reference(bean_name, &instance, exposed)?;
        }

        self.register_disposable_bean_if_necessary(bean_name, &exposed, definition)
            .map_err(|err| wrap_phase(bean_name, CreationPhase::DisposalRegistration, err))?;
        Ok(exposed)
    }

    fn create_bean_instance(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        args: Option<Args>,
        ctx: &mut CreationContext,
    ) -> BeanResult<BeanInstance> {
        if let Some(supplier) = &definition.instance_supplier {
            let class = definition.class.clone().ok_or_else(|| {
                BeanError::creation(bean_name, CreationPhase::Instantiation, "使用实例提供者的定义必须声明组件模型")
            })?;
            let object = supplier().map_err(|err| {
                BeanError::creation_caused_by(bean_name, CreationPhase::Instantiation, "实例提供者失败", err)
            })?;
            return Ok(BeanInstance::new(object, class));
        }

        let resolver = ConstructorResolver::new(self);
        if definition.uses_factory_method() {
            return resolver.instantiate_using_factory_method(bean_name, definition, args, ctx);
        }

        let class = definition.class.clone().ok_or_else(|| {
            BeanError::creation(bean_name, CreationPhase::Instantiation, "定义没有组件模型")
        })?;
        if args.is_none() {
            if let Some(resolved) = self.resolved_arguments(bean_name) {
                return resolver.instantiate_resolved(bean_name, definition, &class, &resolved, ctx);
            }
        }

        let candidates = self
            .post_processors
            .determine_candidate_constructors(&class, bean_name)
            .map_err(|err| wrap_phase(bean_name, CreationPhase::Instantiation, err))?;
        if candidates.is_some()
            || definition.autowire_mode == AutowireMode::Constructor
            || !definition.constructor_args.is_empty()
            || args.is_some()
        {
            return resolver.autowire_constructor(bean_name, definition, &class, candidates, args, ctx);
        }

        let index = class
            .constructors()
            .iter()
            .position(ConstructorInfo::is_default)
            .ok_or_else(|| {
                BeanError::creation(
                    bean_name,
                    CreationPhase::Instantiation,
                    format!("{} 没有无参构造器", class.type_info()),
                )
            })?;
        let object = class.instantiate(index, Args::empty()).map_err(|err| {
            BeanError::creation_caused_by(
                bean_name,
                CreationPhase::Instantiation,
                format!("调用 {} 的无参构造器失败", class.type_info()),
                err,
            )
        })?;
        self.cache_resolved_arguments(
            bean_name,
            ResolvedArguments {
                constructor: Some(index),
                shortcuts: Vec::new(),
            },
        );
        Ok(BeanInstance::new(object, class))
    }

    /// 属性填充
    pub(crate) fn populate_bean(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        bean: &BeanInstance,
        ctx: &mut CreationContext,
    ) -> BeanResult<()> {
        if !self.post_processors.apply_after_instantiation(bean, bean_name)? {
            return Ok(());
        }

        let mut property_values = definition.property_values.clone();
        match definition.autowire_mode {
            AutowireMode::ByName => self.autowire_by_name(bean_name, bean, &mut property_values, ctx)?,
            AutowireMode::ByType => self.autowire_by_type(bean_name, bean, &mut property_values, ctx)?,
            AutowireMode::No | AutowireMode::Constructor => {}
        }

        if self.post_processors.has_instantiation_aware() {
            property_values = self
                .post_processors
                .apply_process_properties(property_values, bean, bean_name, ctx)?;
        }
        if property_values.is_empty() {
            return Ok(());
        }

        let resolver = ValueResolver::new(self, bean_name, definition, CreationPhase::PopulateProperties);
        for (property, value) in property_values.iter() {
            let resolved = resolver.resolve(&format!("属性 '{}' ", property), value, ctx)?;
            bean.set_property(property, resolved).map_err(|err| {
                BeanError::creation_caused_by(
                    bean_name,
                    CreationPhase::PopulateProperties,
                    format!("写入属性 '{}' 失败", property),
                    err,
                )
            })?;
        }
        Ok(())
    }

    /// 尚无配置值的引用属性
    fn unsatisfied_properties(bean: &BeanInstance, property_values: &PropertyValues) -> Vec<PropertyInfo> {
        let value_key = TypeKey::of::<serde_json::Value>();
        bean.model()
            .properties()
            .iter()
            .filter(|property| property.type_key != value_key && !property_values.contains(&property.name))
            .cloned()
            .collect()
    }

    fn autowire_by_name(
        &self,
        bean_name: &str,
        bean: &BeanInstance,
        property_values: &mut PropertyValues,
        ctx: &mut CreationContext,
    ) -> BeanResult<()> {
        for property in Self::unsatisfied_properties(bean, property_values) {
            if !self.contains_bean(&property.name) {
                trace!("按名称装配跳过属性 '{}': 没有同名 Bean", property.name);
                continue;
            }
            let target = self.get_bean_in(&property.name, ctx)?;
            self.register_dependent_bean(&property.name, bean_name);
            debug!("按名称装配: '{}'.{} -> '{}'", bean_name, property.name, property.name);
            property_values.add(property.name.clone(), PropertyValue::Resolved(DynValue::Bean(target)));
        }
        Ok(())
    }

    fn autowire_by_type(
        &self,
        bean_name: &str,
        bean: &BeanInstance,
        property_values: &mut PropertyValues,
        ctx: &mut CreationContext,
    ) -> BeanResult<()> {
        for property in Self::unsatisfied_properties(bean, property_values) {
            let descriptor = DependencyDescriptor::for_property(bean.type_info(), &property, false);
            let resolved = self
                .resolve_dependency(&descriptor, Some(bean_name), ctx)
                .map_err(|err| BeanError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: descriptor.describe(),
                    source: Box::new(err),
                })?;
            if resolved.value.is_null() {
                continue;
            }
            debug!("按类型装配: '{}'.{} -> {:?}", bean_name, property.name, resolved.bean_names);
            property_values.add(property.name.clone(), PropertyValue::Resolved(resolved.value));
        }
        Ok(())
    }

    /// 感知回调、初始化前处理、初始化方法、初始化后处理
    pub(crate) fn initialize(
        &self,
        bean_name: &str,
        bean: BeanInstance,
        definition: Option<&BeanDefinition>,
    ) -> BeanResult<BeanInstance> {
        if let Some(aware) = bean.cast::<dyn BeanNameAware>() {
            aware.set_bean_name(bean_name);
        }
        if let Some(aware) = bean.cast::<dyn BeanFactoryAware>() {
            aware.set_bean_factory(self.weak_dyn());
        }

        let wrapped = self.post_processors.apply_before_initialization(bean, bean_name)?;
        self.invoke_init_methods(bean_name, &wrapped, definition)?;
        self.post_processors.apply_after_initialization(wrapped, bean_name)
    }

    fn invoke_init_methods(
        &self,
        bean_name: &str,
        bean: &BeanInstance,
        definition: Option<&BeanDefinition>,
    ) -> BeanResult<()> {
        let initializing = bean.cast::<dyn InitializingBean>();
        if let Some(initializing) = &initializing {
            debug!("调用 Bean '{}' 的 after_properties_set", bean_name);
            initializing.after_properties_set().map_err(|err| {
                BeanError::creation_caused_by(
                    bean_name,
                    CreationPhase::Initialization,
                    "after_properties_set 失败",
                    err,
                )
            })?;
        }

        let Some(method) = definition.and_then(|definition| definition.init_method.as_deref()) else {
            return Ok(());
        };
        if initializing.is_some() && method == AFTER_PROPERTIES_SET {
            return Ok(());
        }
        debug!("调用 Bean '{}' 的初始化方法 '{}'", bean_name, method);
        bean.invoke(method, Args::empty()).map_err(|err| {
            BeanError::creation_caused_by(
                bean_name,
                CreationPhase::Initialization,
                format!("初始化方法 '{}' 失败", method),
                err,
            )
        })?;
        Ok(())
    }

    /// 早期引用与最终对象的协调
    ///
    /// 早期引用被取用过且初始化没有替换对象时，返回早期引用；初始化替换了对象
    /// 而已有 Bean 注入了原始对象时报错，除非配置允许。
    fn reconcile_early_reference(
        &self,
        bean_name: &str,
        raw: &BeanInstance,
        exposed: BeanInstance,
    ) -> BeanResult<BeanInstance> {
        let Some(early) = self.registry.get_singleton(bean_name, false)? else {
            return Ok(exposed);
        };
        if exposed.same_instance(raw) {
            return Ok(early);
        }
        if self.config.allow_raw_injection_despite_wrapping || !self.registry.has_dependent_bean(bean_name) {
            return Ok(exposed);
        }

        let actual_dependents: Vec<String> = self
            .registry
            .dependent_beans(bean_name)
            .into_iter()
            .filter(|dependent| !self.remove_singleton_if_created_for_type_check_only(dependent))
            .collect();
        if actual_dependents.is_empty() {
            return Ok(exposed);
        }
        Err(BeanError::CurrentlyInCreation {
            bean_name: bean_name.to_string(),
            message: format!(
                "Bean 的原始版本已作为循环引用注入到 {:?}，但最终被包装。这些 Bean 没有使用最终版本",
                actual_dependents
            ),
        })
    }

    fn register_disposable_bean_if_necessary(
        &self,
        bean_name: &str,
        bean: &BeanInstance,
        definition: &BeanDefinition,
    ) -> BeanResult<()> {
        if definition.is_prototype()
            || !DisposableBeanAdapter::requires_destruction(bean, definition, &self.post_processors)
        {
            return Ok(());
        }
        let adapter = DisposableBeanAdapter::new(bean_name, bean.clone(), definition, &self.post_processors);
        match definition.effective_scope() {
            BeanScope::Singleton => {
                self.registry.register_disposable_bean(bean_name, Box::new(adapter));
            }
            BeanScope::Custom(scope_name) => {
                let scope = self.registered_scope(&scope_name).ok_or_else(|| BeanError::DefinitionStore {
                    bean_name: bean_name.to_string(),
                    message: format!("未注册作用域 '{}'", scope_name),
                })?;
                let name = bean_name.to_string();
                scope.register_destruction_callback(
                    bean_name,
                    Box::new(move || {
                        if let Err(err) = infrastructure_common::DisposableBean::destroy(&adapter) {
                            warn!("销毁作用域 Bean '{}' 失败: {}", name, err);
                        }
                    }),
                );
            }
            BeanScope::Prototype => {}
        }
        Ok(())
    }
}

/// 把阶段外的错误包装为创建错误；已经是创建错误族的保持原样
pub(crate) fn wrap_phase(bean_name: &str, phase: CreationPhase, err: BeanError) -> BeanError {
    if err.is_bean_creation() {
        return err;
    }
    let message = err.to_string();
    BeanError::creation_caused_by(bean_name, phase, message, Box::new(err))
}
