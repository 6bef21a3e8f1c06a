//! 默认 Bean 工厂
//!
//! [`DefaultBeanFactory`] 组合定义存储、单例注册表与后处理器链，实现
//! [`BeanFactory`] 与 [`DefinitionRegistry`]。工厂总是以 `Arc` 持有，
//! 早期引用工厂与感知回调只拿到它的弱引用。

mod creation;

use crate::constructor_resolver::ResolvedArguments;
use crate::definition_store::DefinitionStore;
use crate::disposable::DisposableBeanAdapter;
use crate::post_processors::PostProcessorChain;
use crate::resolver::DependencyResolver;
use crate::singleton_registry::SingletonRegistry;
use dashmap::{DashMap, DashSet};
use di_abstractions::{
    is_factory_dereference, transformed_bean_name, Args, AutowireMode, BeanDefinition, BeanFactory,
    BeanInstance, BeanPostProcessor, ComponentModel, CreationContext, DefinitionRegistry,
    DependencyDescriptor, FactoryBean, Resolved, Scope, SmartInitializingSingleton,
    FACTORY_BEAN_PREFIX,
};
use infrastructure_common::{
    BeanError, BeanResult, BeanScope, ContainerConfig, CreationPhase, DisposableBean, TypeInfo, TypeKey,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// 默认 Bean 工厂
pub struct DefaultBeanFactory {
    self_ref: Weak<DefaultBeanFactory>,
    config: ContainerConfig,
    definitions: DefinitionStore,
    registry: SingletonRegistry,
    post_processors: PostProcessorChain,
    /// FactoryBean 生产的单例对象
    factory_bean_objects: DashMap<String, BeanInstance>,
    scopes: DashMap<String, Arc<dyn Scope>>,
    resolved_arguments: DashMap<String, ResolvedArguments>,
    /// 至少完成过一次获取的 Bean
    already_created: DashSet<String>,
    merged_definition_processed: DashSet<String>,
    inner_bean_counter: AtomicUsize,
}

impl DefaultBeanFactory {
    /// 创建工厂
    pub fn new(config: ContainerConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            definitions: DefinitionStore::new(config.allow_bean_definition_overriding),
            config,
            registry: SingletonRegistry::new(),
            post_processors: PostProcessorChain::new(),
            factory_bean_objects: DashMap::new(),
            scopes: DashMap::new(),
            resolved_arguments: DashMap::new(),
            already_created: DashSet::new(),
            merged_definition_processed: DashSet::new(),
            inner_bean_counter: AtomicUsize::new(0),
        })
    }

    /// 自身的弱引用
    pub fn weak_dyn(&self) -> Weak<dyn BeanFactory> {
        let weak: Weak<dyn BeanFactory> = self.self_ref.clone();
        weak
    }

    pub(crate) fn self_weak(&self) -> Weak<DefaultBeanFactory> {
        self.self_ref.clone()
    }

    /// 单例注册表
    pub fn registry(&self) -> &SingletonRegistry {
        &self.registry
    }

    /// 后处理器链
    pub fn post_processors(&self) -> &PostProcessorChain {
        &self.post_processors
    }

    /// 注册已经创建好的单例
    pub fn register_singleton(&self, name: &str, bean: BeanInstance) -> BeanResult<()> {
        self.registry.register_singleton(name, bean)?;
        info!("注册单例: {}", name);
        Ok(())
    }

    /// 添加后处理器，工厂感知的处理器会收到工厂的弱引用
    pub fn add_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        if let Some(aware) = processor.as_factory_aware() {
            aware.set_bean_factory(self.weak_dyn());
        }
        self.post_processors.add(processor);
    }

    /// 注册自定义作用域
    pub fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> BeanResult<()> {
        if name == "singleton" || name == "prototype" {
            return Err(BeanError::DefinitionStore {
                bean_name: name.to_string(),
                message: "不能替换内置作用域".to_string(),
            });
        }
        if self.scopes.insert(name.to_string(), scope).is_some() {
            debug!("替换作用域: {}", name);
        } else {
            info!("注册作用域: {}", name);
        }
        Ok(())
    }

    /// 已注册的自定义作用域
    pub fn registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.get(name).map(|entry| entry.value().clone())
    }

    /// 使用显式参数获取 Bean，通常用于原型
    pub fn get_bean_with_args(&self, name: &str, args: Args) -> BeanResult<BeanInstance> {
        self.do_get_bean(name, Some(args), &mut CreationContext::new())
    }

    /// 合并后的定义
    pub fn merged_bean_definition(&self, name: &str) -> BeanResult<Arc<BeanDefinition>> {
        self.definitions.merged(&self.canonical_name(name))
    }

    /// 预实例化全部非延迟单例，然后回调 [`SmartInitializingSingleton`]
    pub fn pre_instantiate_singletons(&self) -> BeanResult<()> {
        let names = self.definitions.names();
        debug!("预实例化单例, 定义数量: {}", names.len());

        for name in &names {
            let merged = self.merged_bean_definition(name)?;
            if merged.is_abstract || !merged.is_singleton() || merged.is_lazy() {
                continue;
            }
            if self.is_factory_bean_definition(name, &merged) {
                self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, name))?;
            } else {
                self.get_bean(name)?;
            }
        }

        for name in &names {
            let Some(instance) = self.registry.get_singleton(name, false)? else {
                continue;
            };
            if let Some(smart) = instance.cast::<dyn SmartInitializingSingleton>() {
                trace!("回调 Bean '{}' 的 after_singletons_instantiated", name);
                smart.after_singletons_instantiated().map_err(|err| {
                    BeanError::creation_caused_by(
                        name.as_str(),
                        CreationPhase::Initialization,
                        "after_singletons_instantiated 失败",
                        err,
                    )
                })?;
            }
        }
        Ok(())
    }

    /// 销毁全部单例
    pub fn destroy_singletons(&self) {
        self.registry.destroy_singletons();
        self.factory_bean_objects.clear();
        self.already_created.clear();
    }

    /// 销毁单个单例及依赖它的 Bean
    pub fn destroy_singleton(&self, name: &str) {
        self.registry.destroy_singleton(name);
        self.factory_bean_objects.remove(name);
    }

    /// 为外部创建的对象注入依赖，按指定模式装配后再交给属性处理器
    pub fn autowire_bean_properties(&self, bean: &BeanInstance, mode: AutowireMode) -> BeanResult<()> {
        let bean_name = bean.type_info().name.clone();
        let definition = BeanDefinition::new(bean.model().clone())
            .prototype()
            .with_autowire_mode(mode);
        self.populate_bean(&bean_name, &definition, bean, &mut CreationContext::new())
    }

    /// 对外部创建的对象执行感知回调与初始化
    pub fn initialize_bean(&self, bean: BeanInstance, name: &str) -> BeanResult<BeanInstance> {
        self.initialize(name, bean, None)
    }

    pub(crate) fn next_inner_bean_name(&self, type_name: &str) -> String {
        let id = self.inner_bean_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}#{}", type_name, id)
    }

    pub(crate) fn resolved_arguments(&self, name: &str) -> Option<ResolvedArguments> {
        self.resolved_arguments.get(name).map(|entry| entry.value().clone())
    }

    pub(crate) fn cache_resolved_arguments(&self, name: &str, resolved: ResolvedArguments) {
        self.resolved_arguments.entry(name.to_string()).or_insert(resolved);
    }

    fn do_get_bean(&self, name: &str, args: Option<Args>, ctx: &mut CreationContext) -> BeanResult<BeanInstance> {
        let bean_name = self.canonical_name(transformed_bean_name(name));

        if args.is_none() {
            if let Some(shared) = self.registry.get_singleton(&bean_name, true)? {
                if self.registry.is_currently_in_creation(&bean_name) {
                    trace!("返回尚未完成初始化的早期引用: {}", bean_name);
                }
                return self.object_for_bean_instance(shared, name, &bean_name);
            }
        }

        if ctx.is_prototype_in_creation(&bean_name) {
            return Err(BeanError::currently_in_creation(&bean_name));
        }

        let merged = self.merged_bean_definition(&bean_name)?;
        if merged.is_abstract {
            return Err(BeanError::BeanIsAbstract { bean_name });
        }

        self.already_created.insert(bean_name.clone());
        let result = self.get_scoped_bean(name, &bean_name, &merged, args, ctx);
        if result.is_err() {
            self.already_created.remove(&bean_name);
        }
        result
    }

    fn get_scoped_bean(
        &self,
        name: &str,
        bean_name: &str,
        merged: &BeanDefinition,
        args: Option<Args>,
        ctx: &mut CreationContext,
    ) -> BeanResult<BeanInstance> {
        self.create_depends_on(bean_name, merged, ctx)?;

        match merged.effective_scope() {
            BeanScope::Singleton => {
                let instance = self.registry.get_singleton_or_create(bean_name, || {
                    self.create_bean(bean_name, merged, args, ctx).map_err(|err| {
                        // 清除可能已经暴露的早期引用
                        self.destroy_singleton(bean_name);
                        err
                    })
                })?;
                self.object_for_bean_instance(instance, name, bean_name)
            }
            BeanScope::Prototype => {
                ctx.enter_prototype(bean_name)?;
                let created = self.create_bean(bean_name, merged, args, ctx);
                ctx.exit_prototype(bean_name);
                self.object_for_bean_instance(created?, name, bean_name)
            }
            BeanScope::Custom(scope_name) => {
                let scope = self.registered_scope(&scope_name).ok_or_else(|| BeanError::DefinitionStore {
                    bean_name: bean_name.to_string(),
                    message: format!("未注册作用域 '{}'", scope_name),
                })?;
                let mut args = args;
                let instance = scope.get(bean_name, &mut || {
                    ctx.enter_prototype(bean_name)?;
                    let created = self.create_bean(bean_name, merged, args.take(), ctx);
                    ctx.exit_prototype(bean_name);
                    created
                })?;
                self.object_for_bean_instance(instance, name, bean_name)
            }
        }
    }

    fn create_depends_on(&self, bean_name: &str, merged: &BeanDefinition, ctx: &mut CreationContext) -> BeanResult<()> {
        for dependency in &merged.depends_on {
            let dependency_name = self.canonical_name(dependency);
            if self.registry.is_dependent(bean_name, &dependency_name) {
                return Err(BeanError::creation(
                    bean_name,
                    CreationPhase::DependsOn,
                    format!("与 '{}' 之间存在循环的 depends-on 关系", dependency),
                ));
            }
            self.registry.register_dependent_bean(&dependency_name, bean_name);
            self.get_bean_in(dependency, ctx).map_err(|err| {
                BeanError::creation_caused_by(
                    bean_name,
                    CreationPhase::DependsOn,
                    format!("前置依赖 '{}' 创建失败", dependency),
                    Box::new(err),
                )
            })?;
        }
        Ok(())
    }

    /// 把实例转换为对外暴露的对象：`&name` 返回 FactoryBean 本身，其余返回它的产品
    pub(crate) fn object_for_bean_instance(
        &self,
        instance: BeanInstance,
        requested_name: &str,
        bean_name: &str,
    ) -> BeanResult<BeanInstance> {
        if is_factory_dereference(requested_name) {
            if instance.cast::<dyn FactoryBean>().is_none() {
                return Err(BeanError::BeanNotOfRequiredType {
                    bean_name: bean_name.to_string(),
                    required_type: "FactoryBean".to_string(),
                    actual_type: instance.type_info().name.clone(),
                });
            }
            return Ok(instance);
        }
        let Some(factory_bean) = instance.cast::<dyn FactoryBean>() else {
            return Ok(instance);
        };
        if let Some(cached) = self.factory_bean_objects.get(bean_name) {
            return Ok(cached.value().clone());
        }
        self.object_from_factory_bean(factory_bean.as_ref(), bean_name)
    }

    fn object_from_factory_bean(&self, factory_bean: &dyn FactoryBean, bean_name: &str) -> BeanResult<BeanInstance> {
        if factory_bean.is_singleton() && self.registry.contains_singleton(bean_name) {
            return self.registry.synchronized(|| {
                if let Some(cached) = self.factory_bean_objects.get(bean_name) {
                    return Ok(cached.value().clone());
                }
                let object = self.factory_bean_object(factory_bean, bean_name)?;
                if let Some(cached) = self.factory_bean_objects.get(bean_name) {
                    return Ok(cached.value().clone());
                }
                if self.registry.is_currently_in_creation(bean_name) {
                    // 产品稍后随 FactoryBean 完成再做后处理
                    return Ok(object);
                }
                let object = self.post_process_factory_bean_object(object, bean_name)?;
                self.factory_bean_objects
                    .insert(bean_name.to_string(), object.clone());
                Ok(object)
            });
        }
        let object = self.factory_bean_object(factory_bean, bean_name)?;
        self.post_process_factory_bean_object(object, bean_name)
    }

    fn factory_bean_object(&self, factory_bean: &dyn FactoryBean, bean_name: &str) -> BeanResult<BeanInstance> {
        factory_bean.get_object().map_err(|err| {
            BeanError::creation_caused_by(
                bean_name,
                CreationPhase::FactoryBeanObject,
                "FactoryBean 生产对象失败",
                err,
            )
        })
    }

    fn post_process_factory_bean_object(&self, object: BeanInstance, bean_name: &str) -> BeanResult<BeanInstance> {
        self.post_processors
            .apply_after_initialization(object, bean_name)
            .map_err(|err| {
                BeanError::creation_caused_by(
                    bean_name,
                    CreationPhase::FactoryBeanObject,
                    "FactoryBean 产品的后处理失败",
                    Box::new(err),
                )
            })
    }

    fn is_factory_bean_definition(&self, bean_name: &str, merged: &BeanDefinition) -> bool {
        if let Ok(Some(instance)) = self.registry.get_singleton(bean_name, false) {
            return instance.cast::<dyn FactoryBean>().is_some();
        }
        !merged.uses_factory_method()
            && merged
                .class
                .as_ref()
                .map_or(false, |class| class.is_assignable_to(TypeKey::of::<dyn FactoryBean>()))
    }

    /// 预测 Bean 的组件模型；工厂方法以定义中声明的模型为准
    fn predict_model(&self, bean_name: &str, merged: &BeanDefinition) -> Option<Arc<dyn ComponentModel>> {
        let class = merged.class.clone()?;
        if merged.uses_factory_method() {
            return Some(class);
        }
        Some(
            self.post_processors
                .predict_bean_type(&class, bean_name)
                .unwrap_or(class),
        )
    }

    /// FactoryBean 产品的组件模型，必要时创建 FactoryBean
    fn factory_product_model(&self, bean_name: &str) -> BeanResult<Option<Arc<dyn ComponentModel>>> {
        if let Some(cached) = self.factory_bean_objects.get(bean_name) {
            return Ok(Some(cached.value().model().clone()));
        }
        if self.registry.is_currently_in_creation(bean_name) {
            return Ok(None);
        }
        if !self.config.allow_eager_class_loading && !self.registry.contains_singleton(bean_name) {
            return Ok(None);
        }
        let factory = self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name))?;
        Ok(factory
            .cast::<dyn FactoryBean>()
            .and_then(|factory_bean| factory_bean.object_model()))
    }

    fn reset_bean_definition(&self, bean_name: &str, visited: &mut HashSet<String>) {
        if !visited.insert(bean_name.to_string()) {
            return;
        }
        debug!("重置 Bean 定义: {}", bean_name);
        self.definitions.clear_merged(bean_name);
        self.destroy_singleton(bean_name);
        self.resolved_arguments.remove(bean_name);
        self.merged_definition_processed.remove(bean_name);
        self.post_processors.reset_bean_definition(bean_name);
        for child in self.definitions.children_of(bean_name) {
            self.reset_bean_definition(&child, visited);
        }
    }

    fn remove_singleton_if_created_for_type_check_only(&self, bean_name: &str) -> bool {
        if self.already_created.contains(bean_name) {
            return false;
        }
        self.registry.remove_singleton(bean_name);
        true
    }
}

impl DefinitionRegistry for DefaultBeanFactory {
    fn register_definition(&self, name: &str, definition: BeanDefinition) -> BeanResult<()> {
        let replaced = self.definitions.register(name, definition)?;
        if replaced || self.registry.contains_singleton(name) {
            self.reset_bean_definition(name, &mut HashSet::new());
        }
        Ok(())
    }

    fn remove_definition(&self, name: &str) -> BeanResult<()> {
        self.definitions.remove(name)?;
        self.reset_bean_definition(name, &mut HashSet::new());
        Ok(())
    }

    fn definition(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.definitions.get(name)
    }

    fn contains_definition(&self, name: &str) -> bool {
        self.definitions.contains(name)
    }

    fn definition_names(&self) -> Vec<String> {
        self.definitions.names()
    }

    fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    fn merged_definition(&self, name: &str) -> BeanResult<Arc<BeanDefinition>> {
        self.merged_bean_definition(name)
    }

    fn register_alias(&self, name: &str, alias: &str) -> BeanResult<()> {
        self.definitions.register_alias(name, alias)
    }

    fn remove_alias(&self, alias: &str) -> BeanResult<()> {
        self.definitions.remove_alias(alias)
    }

    fn canonical_name(&self, name: &str) -> String {
        self.definitions.canonical_name(name)
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        self.definitions.aliases(name)
    }
}

impl BeanFactory for DefaultBeanFactory {
    fn get_bean_in(&self, name: &str, ctx: &mut CreationContext) -> BeanResult<BeanInstance> {
        self.do_get_bean(name, None, ctx)
    }

    fn contains_bean(&self, name: &str) -> bool {
        let bean_name = self.canonical_name(transformed_bean_name(name));
        if !self.registry.contains_singleton(&bean_name) && !self.definitions.contains(&bean_name) {
            return false;
        }
        if !is_factory_dereference(name) {
            return true;
        }
        self.merged_bean_definition(&bean_name).map_or_else(
            |_| {
                self.registry
                    .get_singleton(&bean_name, false)
                    .ok()
                    .flatten()
                    .map_or(false, |instance| instance.cast::<dyn FactoryBean>().is_some())
            },
            |merged| self.is_factory_bean_definition(&bean_name, &merged),
        )
    }

    fn is_singleton(&self, name: &str) -> BeanResult<bool> {
        let bean_name = self.canonical_name(transformed_bean_name(name));
        let dereference = is_factory_dereference(name);
        if let Some(instance) = self.registry.get_singleton(&bean_name, false)? {
            return Ok(match instance.cast::<dyn FactoryBean>() {
                Some(factory_bean) if !dereference => factory_bean.is_singleton(),
                _ => true,
            });
        }
        let merged = self.merged_bean_definition(&bean_name)?;
        if !merged.is_singleton() {
            return Ok(false);
        }
        if self.is_factory_bean_definition(&bean_name, &merged) && !dereference {
            let factory = self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name))?;
            return Ok(factory
                .cast::<dyn FactoryBean>()
                .map_or(true, |factory_bean| factory_bean.is_singleton()));
        }
        Ok(true)
    }

    fn is_prototype(&self, name: &str) -> BeanResult<bool> {
        let bean_name = self.canonical_name(transformed_bean_name(name));
        let dereference = is_factory_dereference(name);
        if self.registry.contains_singleton(&bean_name) && !self.definitions.contains(&bean_name) {
            return Ok(false);
        }
        let merged = self.merged_bean_definition(&bean_name)?;
        if merged.is_prototype() {
            return Ok(!dereference || self.is_factory_bean_definition(&bean_name, &merged));
        }
        if dereference || !self.is_factory_bean_definition(&bean_name, &merged) {
            return Ok(false);
        }
        let factory = self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name))?;
        Ok(factory
            .cast::<dyn FactoryBean>()
            .map_or(false, |factory_bean| !factory_bean.is_singleton()))
    }

    fn is_type_match(&self, name: &str, key: TypeKey) -> BeanResult<bool> {
        let bean_name = self.canonical_name(transformed_bean_name(name));
        let dereference = is_factory_dereference(name);

        if let Some(instance) = self.registry.get_singleton(&bean_name, false)? {
            if instance.cast::<dyn FactoryBean>().is_some() {
                if dereference {
                    return Ok(instance.is_assignable_to(key));
                }
                return Ok(self
                    .factory_product_model(&bean_name)?
                    .map_or(false, |model| model.is_assignable_to(key)));
            }
            return Ok(!dereference && instance.is_assignable_to(key));
        }

        if !self.definitions.contains(&bean_name) {
            return Ok(false);
        }
        let merged = self.merged_bean_definition(&bean_name)?;
        let Some(model) = self.predict_model(&bean_name, &merged) else {
            return Ok(false);
        };
        let is_factory_bean = self.is_factory_bean_definition(&bean_name, &merged);
        if is_factory_bean && !dereference {
            return Ok(self
                .factory_product_model(&bean_name)?
                .map_or(false, |product| product.is_assignable_to(key)));
        }
        if dereference && !is_factory_bean {
            return Ok(false);
        }
        Ok(model.is_assignable_to(key))
    }

    fn type_of(&self, name: &str) -> BeanResult<Option<TypeInfo>> {
        let bean_name = self.canonical_name(transformed_bean_name(name));
        let dereference = is_factory_dereference(name);
        if let Some(instance) = self.registry.get_singleton(&bean_name, false)? {
            if instance.cast::<dyn FactoryBean>().is_some() && !dereference {
                return Ok(self
                    .factory_product_model(&bean_name)?
                    .map(|model| model.type_info().clone()));
            }
            return Ok(Some(instance.type_info().clone()));
        }
        let merged = self.merged_bean_definition(&bean_name)?;
        if self.is_factory_bean_definition(&bean_name, &merged) && !dereference {
            return Ok(self
                .factory_product_model(&bean_name)?
                .map(|model| model.type_info().clone()));
        }
        Ok(self
            .predict_model(&bean_name, &merged)
            .map(|model| model.type_info().clone()))
    }

    fn bean_names_for_type(&self, key: TypeKey, include_non_singletons: bool, allow_eager_init: bool) -> Vec<String> {
        let mut result = Vec::new();

        for name in self.definitions.names() {
            let Ok(merged) = self.merged_bean_definition(&name) else {
                continue;
            };
            if merged.is_abstract {
                continue;
            }
            let scope_matches = include_non_singletons || merged.is_singleton();
            if !self.is_factory_bean_definition(&name, &merged) {
                if scope_matches && self.is_type_match(&name, key).unwrap_or(false) {
                    result.push(name);
                }
                continue;
            }

            let product_checkable = allow_eager_init || self.registry.contains_singleton(&name);
            let product_matches = product_checkable
                && (include_non_singletons || self.is_singleton(&name).unwrap_or(false))
                && self.is_type_match(&name, key).unwrap_or(false);
            if product_matches {
                result.push(name);
                continue;
            }
            let factory_name = format!("{}{}", FACTORY_BEAN_PREFIX, name);
            if scope_matches && self.is_type_match(&factory_name, key).unwrap_or(false) {
                result.push(factory_name);
            }
        }

        for name in self.registry.singleton_names() {
            if self.definitions.contains(&name) {
                continue;
            }
            let Ok(Some(instance)) = self.registry.get_singleton(&name, false) else {
                continue;
            };
            match instance.cast::<dyn FactoryBean>() {
                Some(factory_bean) => {
                    let product_matches = factory_bean
                        .object_model()
                        .map_or(false, |model| model.is_assignable_to(key));
                    if product_matches {
                        result.push(name);
                    } else if instance.is_assignable_to(key) {
                        result.push(format!("{}{}", FACTORY_BEAN_PREFIX, name));
                    }
                }
                None => {
                    if instance.is_assignable_to(key) {
                        result.push(name);
                    }
                }
            }
        }
        result
    }

    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
        ctx: &mut CreationContext,
    ) -> BeanResult<Resolved> {
        DependencyResolver::new(self).resolve(descriptor, requesting_bean, ctx)
    }

    fn is_currently_in_creation(&self, name: &str) -> bool {
        self.registry
            .is_currently_in_creation(&self.canonical_name(transformed_bean_name(name)))
    }

    fn register_dependent_bean(&self, name: &str, dependent: &str) {
        let name = self.canonical_name(transformed_bean_name(name));
        let dependent = self.canonical_name(dependent);
        self.registry.register_dependent_bean(&name, &dependent);
    }

    fn config(&self) -> &ContainerConfig {
        &self.config
    }

    fn destroy_bean(&self, name: &str, instance: &BeanInstance) {
        let definition = self
            .merged_bean_definition(name)
            .map(|merged| (*merged).clone())
            .unwrap_or_default();
        let adapter = DisposableBeanAdapter::new(name, instance.clone(), &definition, &self.post_processors);
        if let Err(err) = adapter.destroy() {
            warn!("销毁 Bean '{}' 失败: {}", name, err);
        }
    }
}
