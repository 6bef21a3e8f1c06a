//! 自动代理创建器
//!
//! 作为后处理器挂在创建流程上：实例化前为自定义目标源直接返回代理，
//! 早期引用与初始化后为需要通知的 Bean 包装代理。哪些通知器适用由
//! [`AdvisorStrategy`] 决定。

use super::adapters::DefaultAdvisorAdapterRegistry;
use super::advisor::simple_match;
use super::proxy::DynamicAopProxyFactory;
use super::target_source::{SingletonTargetSource, ORIGINAL_SUFFIX};
use dashmap::{DashMap, DashSet};
use di_abstractions::{
    advisor_can_apply, AdvisedSupport, Advisor, AdvisorAdapterRegistry, AfterReturningAdvice, AopInfrastructureBean,
    AopProxyFactory, BeanDefinition, BeanFactory, BeanFactoryAware, BeanInstance, BeanPostProcessor, ComponentModel,
    FactoryBean, InitializationAware, InstantiationAware, MergedDefinitionAware, MethodBeforeAdvice,
    MethodInterceptor, SmartInstantiationAware, TargetSource, TargetSourceCreator, ThrowsAdvice,
    FACTORY_BEAN_PREFIX,
};
use infrastructure_common::{BeanError, BeanResult, TypeInfo, TypeKey, LOWEST_PRECEDENCE};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace};

/// 通知器查找策略
pub trait AdvisorStrategy: Send + Sync {
    /// 策略名称，用于日志
    fn name(&self) -> &str;

    /// 适用于该 Bean 的专属通知器
    ///
    /// 返回 `None` 表示不代理；`Some` 中的列表可以为空，此时代理只带公共拦截器
    fn advisors_for(
        &self,
        factory: &Arc<dyn BeanFactory>,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<Vec<Arc<dyn Advisor>>>>;
}

/// 以容器中的通知器 Bean 为来源
pub struct AdvisorBeansStrategy {
    advisor_names: RwLock<Option<Vec<String>>>,
}

impl AdvisorBeansStrategy {
    /// 首次查找时才收集通知器名称
    pub fn new() -> Self {
        Self {
            advisor_names: RwLock::new(None),
        }
    }

    fn advisor_names(&self, factory: &Arc<dyn BeanFactory>) -> Vec<String> {
        if let Some(names) = self.advisor_names.read().as_ref() {
            return names.clone();
        }
        let names = factory.bean_names_for_type(TypeKey::of::<dyn Advisor>(), true, false);
        debug!("发现通知器 Bean: {:?}", names);
        self.advisor_names.write().get_or_insert(names).clone()
    }
}

impl Default for AdvisorBeansStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorStrategy for AdvisorBeansStrategy {
    fn name(&self) -> &str {
        "AdvisorBeans"
    }

    fn advisors_for(
        &self,
        factory: &Arc<dyn BeanFactory>,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<Vec<Arc<dyn Advisor>>>> {
        let mut advisors: Vec<Arc<dyn Advisor>> = Vec::new();
        for name in self.advisor_names(factory) {
            if factory.is_currently_in_creation(&name) {
                trace!("跳过正在创建的通知器 '{}'", name);
                continue;
            }
            match factory.get_bean(&name) {
                Ok(bean) => match bean.cast::<dyn Advisor>() {
                    Some(advisor) => advisors.push(advisor),
                    None => debug!("Bean '{}' 不能作为通知器使用", name),
                },
                Err(err) if err.contains_currently_in_creation() => {
                    debug!("通知器 '{}' 依赖正在创建的 Bean, 本次跳过: {}", name, err);
                }
                Err(err) => return Err(err),
            }
        }

        advisors.retain(|advisor| advisor_can_apply(advisor.as_ref(), model.as_ref()));
        advisors.sort_by_key(|advisor| advisor.order());
        if advisors.is_empty() {
            return Ok(None);
        }
        trace!("Bean '{}' 适用的通知器数量: {}", bean_name, advisors.len());
        Ok(Some(advisors))
    }
}

/// 按 Bean 名称选择代理对象，只应用公共拦截器
///
/// 名称支持 `*` 通配符。FactoryBean 本身只匹配带 `&` 前缀的名称，
/// 不带前缀的名称匹配它的产品。
pub struct BeanNameStrategy {
    patterns: Vec<String>,
}

impl BeanNameStrategy {
    /// 按名称模式创建
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    fn is_match(&self, name: &str, is_factory_bean: bool) -> bool {
        self.patterns.iter().any(|pattern| {
            if is_factory_bean {
                pattern
                    .strip_prefix(FACTORY_BEAN_PREFIX)
                    .is_some_and(|pattern| simple_match(pattern, name))
            } else {
                simple_match(pattern, name)
            }
        })
    }
}

impl AdvisorStrategy for BeanNameStrategy {
    fn name(&self) -> &str {
        "BeanName"
    }

    fn advisors_for(
        &self,
        factory: &Arc<dyn BeanFactory>,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<Vec<Arc<dyn Advisor>>>> {
        let is_factory_bean = model.is_assignable_to(TypeKey::of::<dyn FactoryBean>());
        let matched = self.is_match(bean_name, is_factory_bean)
            || factory
                .aliases(bean_name)
                .iter()
                .any(|alias| self.is_match(alias, is_factory_bean));
        Ok(matched.then(Vec::new))
    }
}

/// 代理决策
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyDecision {
    /// 不需要代理
    NoProxy,
    /// 已代理
    Proxy {
        /// 代理上的通知器数量，含公共拦截器
        advisors: usize,
        /// 代理对外暴露的类型
        proxy_type: TypeInfo,
    },
}

struct CachedDecision {
    decision: ProxyDecision,
    advisors: Vec<Arc<dyn Advisor>>,
}

impl CachedDecision {
    fn no_proxy() -> Self {
        Self {
            decision: ProxyDecision::NoProxy,
            advisors: Vec::new(),
        }
    }
}

/// 自动代理创建器
pub struct AutoProxyCreator<S: AdvisorStrategy> {
    strategy: S,
    factory: RwLock<Option<Weak<dyn BeanFactory>>>,
    proxy_factory: Arc<dyn AopProxyFactory>,
    adapters: Arc<dyn AdvisorAdapterRegistry>,
    target_source_creators: Vec<Arc<dyn TargetSourceCreator>>,
    advised_beans: DashMap<String, CachedDecision>,
    early_proxy_references: DashMap<String, BeanInstance>,
    target_sourced_beans: DashSet<String>,
    advisor_lookups: AtomicUsize,
    order: i32,
}

/// 以通知器 Bean 驱动的自动代理
pub type DefaultAdvisorAutoProxyCreator = AutoProxyCreator<AdvisorBeansStrategy>;

/// 以 Bean 名称驱动的自动代理
pub type BeanNameAutoProxyCreator = AutoProxyCreator<BeanNameStrategy>;

impl<S: AdvisorStrategy> AutoProxyCreator<S> {
    /// 使用默认代理工厂与通知适配器创建
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            factory: RwLock::new(None),
            proxy_factory: Arc::new(DynamicAopProxyFactory),
            adapters: Arc::new(DefaultAdvisorAdapterRegistry::new()),
            target_source_creators: Vec::new(),
            advised_beans: DashMap::new(),
            early_proxy_references: DashMap::new(),
            target_sourced_beans: DashSet::new(),
            advisor_lookups: AtomicUsize::new(0),
            order: LOWEST_PRECEDENCE,
        }
    }

    /// 追加自定义目标源创建器
    pub fn with_target_source_creator(mut self, creator: Arc<dyn TargetSourceCreator>) -> Self {
        self.target_source_creators.push(creator);
        self
    }

    /// 替换代理工厂
    pub fn with_proxy_factory(mut self, proxy_factory: Arc<dyn AopProxyFactory>) -> Self {
        self.proxy_factory = proxy_factory;
        self
    }

    /// 替换通知适配器注册表
    pub fn with_adapters(mut self, adapters: Arc<dyn AdvisorAdapterRegistry>) -> Self {
        self.adapters = adapters;
        self
    }

    /// 设置处理器在后处理器链中的顺序
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// 缓存的代理决策，键为 Bean 名称，FactoryBean 本身使用 `&name`
    pub fn decision(&self, cache_key: &str) -> Option<ProxyDecision> {
        self.advised_beans
            .get(cache_key)
            .map(|cached| cached.decision.clone())
    }

    /// 代理对外暴露的类型
    pub fn proxy_type(&self, cache_key: &str) -> Option<TypeInfo> {
        match self.decision(cache_key)? {
            ProxyDecision::Proxy { proxy_type, .. } => Some(proxy_type),
            ProxyDecision::NoProxy => None,
        }
    }

    /// 通知器查找次数
    pub fn advisor_lookups(&self) -> usize {
        self.advisor_lookups.load(Ordering::SeqCst)
    }

    fn factory(&self, bean_name: &str) -> BeanResult<Arc<dyn BeanFactory>> {
        self.factory
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| BeanError::AopConfig {
                message: format!("自动代理创建器尚未绑定 Bean 工厂, 无法处理 '{}'", bean_name),
            })
    }

    fn cache_key(model: &dyn ComponentModel, bean_name: &str) -> String {
        if model.is_assignable_to(TypeKey::of::<dyn FactoryBean>()) {
            format!("{}{}", FACTORY_BEAN_PREFIX, bean_name)
        } else {
            bean_name.to_string()
        }
    }

    fn is_infrastructure(model: &dyn ComponentModel) -> bool {
        [
            TypeKey::of::<dyn Advisor>(),
            TypeKey::of::<dyn MethodInterceptor>(),
            TypeKey::of::<dyn MethodBeforeAdvice>(),
            TypeKey::of::<dyn AfterReturningAdvice>(),
            TypeKey::of::<dyn ThrowsAdvice>(),
            TypeKey::of::<dyn AopInfrastructureBean>(),
        ]
        .into_iter()
        .any(|key| model.is_assignable_to(key))
    }

    fn should_skip(bean_name: &str) -> bool {
        bean_name.ends_with(ORIGINAL_SUFFIX)
    }

    fn lookup_advisors(
        &self,
        factory: &Arc<dyn BeanFactory>,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<Vec<Arc<dyn Advisor>>>> {
        self.advisor_lookups.fetch_add(1, Ordering::SeqCst);
        self.strategy.advisors_for(factory, model, bean_name)
    }

    /// 专属通知器与公共拦截器合并
    fn build_advisors(
        &self,
        factory: &Arc<dyn BeanFactory>,
        bean_name: &str,
        specific: Vec<Arc<dyn Advisor>>,
    ) -> BeanResult<Vec<Arc<dyn Advisor>>> {
        let proxy_config = &factory.config().proxy;
        let mut common = Vec::with_capacity(proxy_config.interceptor_names.len());
        for name in &proxy_config.interceptor_names {
            let interceptor = factory.get_bean(name)?;
            common.push(self.adapters.wrap(&interceptor)?);
        }
        debug!(
            "Bean '{}' 的通知器: 公共 {} 个, 专属 {} 个",
            bean_name,
            common.len(),
            specific.len()
        );
        if common.is_empty() {
            return Ok(specific);
        }
        let advisors = if proxy_config.apply_common_interceptors_first {
            common.into_iter().chain(specific).collect()
        } else {
            specific.into_iter().chain(common).collect()
        };
        Ok(advisors)
    }

    fn create_proxy(
        &self,
        factory: &Arc<dyn BeanFactory>,
        bean_name: &str,
        cache_key: &str,
        target_source: Arc<dyn TargetSource>,
        advisors: Vec<Arc<dyn Advisor>>,
    ) -> BeanResult<BeanInstance> {
        let proxy = self.proxy_factory.create_proxy(AdvisedSupport {
            target_source,
            advisors: advisors.clone(),
            adapters: self.adapters.clone(),
            frozen: factory.config().proxy.freeze_proxy,
        })?;
        info!(
            "为 Bean '{}' 创建代理, 通知器数量: {}",
            bean_name,
            advisors.len()
        );
        self.advised_beans.insert(
            cache_key.to_string(),
            CachedDecision {
                decision: ProxyDecision::Proxy {
                    advisors: advisors.len(),
                    proxy_type: proxy.type_info().clone(),
                },
                advisors,
            },
        );
        Ok(proxy)
    }

    fn wrap_if_necessary(&self, bean: BeanInstance, bean_name: &str, cache_key: &str) -> BeanResult<BeanInstance> {
        if self.target_sourced_beans.contains(bean_name) {
            return Ok(bean);
        }
        let cached = self.advised_beans.get(cache_key).map(|cached| match &cached.decision {
            ProxyDecision::NoProxy => None,
            ProxyDecision::Proxy { .. } => Some(cached.advisors.clone()),
        });
        let advisors = match cached {
            Some(None) => return Ok(bean),
            Some(Some(advisors)) => advisors,
            None => {
                if Self::is_infrastructure(bean.model().as_ref()) || Self::should_skip(bean_name) {
                    trace!("跳过基础设施 Bean '{}'", bean_name);
                    self.advised_beans.insert(cache_key.to_string(), CachedDecision::no_proxy());
                    return Ok(bean);
                }
                let factory = self.factory(bean_name)?;
                match self.lookup_advisors(&factory, bean.model(), bean_name)? {
                    Some(specific) => self.build_advisors(&factory, bean_name, specific)?,
                    None => {
                        trace!("Bean '{}' 不需要代理", bean_name);
                        self.advised_beans.insert(cache_key.to_string(), CachedDecision::no_proxy());
                        return Ok(bean);
                    }
                }
            }
        };
        let factory = self.factory(bean_name)?;
        let target_source: Arc<dyn TargetSource> = Arc::new(SingletonTargetSource::new(bean));
        self.create_proxy(&factory, bean_name, cache_key, target_source, advisors)
    }
}

impl<S: AdvisorStrategy> BeanPostProcessor for AutoProxyCreator<S> {
    fn name(&self) -> &str {
        self.strategy.name()
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn as_initialization_aware(&self) -> Option<&dyn InitializationAware> {
        Some(self)
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

impl<S: AdvisorStrategy> BeanFactoryAware for AutoProxyCreator<S> {
    fn set_bean_factory(&self, factory: Weak<dyn BeanFactory>) {
        *self.factory.write() = Some(factory);
    }
}

impl<S: AdvisorStrategy> InstantiationAware for AutoProxyCreator<S> {
    fn before_instantiation(
        &self,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<BeanInstance>> {
        if self.target_source_creators.is_empty() {
            return Ok(None);
        }
        let cache_key = Self::cache_key(model.as_ref(), bean_name);
        if self.advised_beans.contains_key(&cache_key) {
            return Ok(None);
        }
        if Self::is_infrastructure(model.as_ref()) || Self::should_skip(bean_name) {
            self.advised_beans.insert(cache_key, CachedDecision::no_proxy());
            return Ok(None);
        }

        let factory = self.factory(bean_name)?;
        for creator in &self.target_source_creators {
            let Some(target_source) = creator.target_source(model, bean_name, &factory)? else {
                continue;
            };
            self.target_sourced_beans.insert(bean_name.to_string());
            let specific = self
                .lookup_advisors(&factory, model, bean_name)?
                .unwrap_or_default();
            let advisors = self.build_advisors(&factory, bean_name, specific)?;
            debug!("Bean '{}' 使用自定义目标源", bean_name);
            return self
                .create_proxy(&factory, bean_name, &cache_key, target_source, advisors)
                .map(Some);
        }
        Ok(None)
    }
}

impl<S: AdvisorStrategy> SmartInstantiationAware for AutoProxyCreator<S> {
    fn early_bean_reference(&self, bean: BeanInstance, bean_name: &str) -> BeanResult<BeanInstance> {
        let cache_key = Self::cache_key(bean.model().as_ref(), bean_name);
        self.early_proxy_references.insert(cache_key.clone(), bean.clone());
        self.wrap_if_necessary(bean, bean_name, &cache_key)
    }
}

impl<S: AdvisorStrategy> InitializationAware for AutoProxyCreator<S> {
    fn after_initialization(&self, bean: BeanInstance, bean_name: &str) -> BeanResult<Option<BeanInstance>> {
        let cache_key = Self::cache_key(bean.model().as_ref(), bean_name);
        if let Some((_, early)) = self.early_proxy_references.remove(&cache_key) {
            if early.same_instance(&bean) {
                return Ok(Some(bean));
            }
        }
        self.wrap_if_necessary(bean, bean_name, &cache_key).map(Some)
    }
}

impl<S: AdvisorStrategy> MergedDefinitionAware for AutoProxyCreator<S> {
    fn post_process_merged_definition(
        &self,
        _definition: &BeanDefinition,
        _model: &Arc<dyn ComponentModel>,
        _bean_name: &str,
    ) -> BeanResult<()> {
        Ok(())
    }

    fn reset_bean_definition(&self, bean_name: &str) {
        self.advised_beans.remove(bean_name);
        self.advised_beans
            .remove(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name));
        self.target_sourced_beans.remove(bean_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::{DefaultPointcutAdvisor, LazyInitTargetSourceCreator, NameMatchMethodPointcut};
    use crate::component_model::BeanClass;
    use crate::factory::DefaultBeanFactory;
    use di_abstractions::{Advice, Advised, Args, BeanFactoryExt, DefinitionRegistry, DynValue, MethodInvocation};
    use infrastructure_common::{BoxError, ContainerConfig, ProxyConfig};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    trait Counter: Send + Sync {
        fn next(&self) -> Result<i64, BoxError>;
    }

    struct SimpleCounter {
        value: AtomicUsize,
    }

    impl Counter for SimpleCounter {
        fn next(&self) -> Result<i64, BoxError> {
            Ok(self.value.fetch_add(1, Ordering::SeqCst) as i64 + 1)
        }
    }

    struct CounterProxy(BeanInstance);

    impl Counter for CounterProxy {
        fn next(&self) -> Result<i64, BoxError> {
            self.0.invoke("next", Args::empty())?.to::<i64>()
        }
    }

    static CREATED: AtomicUsize = AtomicUsize::new(0);

    fn counter_model() -> Arc<dyn ComponentModel> {
        BeanClass::<SimpleCounter>::builder()
            .default_constructor(|| {
                CREATED.fetch_add(1, Ordering::SeqCst);
                SimpleCounter {
                    value: AtomicUsize::new(0),
                }
            })
            .implements::<dyn Counter>(|counter| counter)
            .proxy_view::<dyn Counter>(|proxy| Arc::new(CounterProxy(proxy)))
            .method("next", |counter, _| Ok(DynValue::Value(counter.next()?.into())))
            .build()
    }

    /// 把返回值乘以十的环绕拦截器
    struct TimesTen {
        calls: Mutex<Vec<String>>,
    }

    impl MethodInterceptor for TimesTen {
        fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<DynValue, BoxError> {
            self.calls.lock().push(invocation.method().to_string());
            let value = invocation.proceed()?.to::<i64>()?;
            Ok(DynValue::Value((value * 10).into()))
        }
    }

    fn advisor_bean(advisor: DefaultPointcutAdvisor) -> BeanInstance {
        let model = BeanClass::<DefaultPointcutAdvisor>::builder()
            .implements::<dyn Advisor>(|advisor| advisor)
            .build();
        BeanInstance::of(advisor, model)
    }

    fn factory_with_advisor(creator: Arc<DefaultAdvisorAutoProxyCreator>) -> (Arc<DefaultBeanFactory>, Arc<TimesTen>) {
        let factory = DefaultBeanFactory::new(ContainerConfig::default());
        let interceptor = Arc::new(TimesTen {
            calls: Mutex::new(Vec::new()),
        });
        let advisor = DefaultPointcutAdvisor::new(Advice::Around(interceptor.clone()))
            .with_pointcut(Arc::new(NameMatchMethodPointcut::new(["next"])));
        factory.register_singleton("timesTen", advisor_bean(advisor)).unwrap();
        factory.add_post_processor(creator);
        (factory, interceptor)
    }

    #[test]
    fn test_matching_bean_is_proxied_and_decision_cached() {
        let creator = Arc::new(AutoProxyCreator::new(AdvisorBeansStrategy::new()));
        let (factory, interceptor) = factory_with_advisor(creator.clone());
        factory
            .register_definition("counter", BeanDefinition::new(counter_model()).prototype())
            .unwrap();

        let first = factory.get_as::<dyn Counter>("counter").unwrap();
        let second = factory.get_as::<dyn Counter>("counter").unwrap();
        assert_eq!(first.next().unwrap(), 10);
        assert_eq!(second.next().unwrap(), 10);
        assert_eq!(*interceptor.calls.lock(), vec!["next", "next"]);

        assert_eq!(creator.advisor_lookups(), 1);
        let proxy_type = creator.proxy_type("counter").unwrap();
        assert_eq!(proxy_type.key, TypeKey::of::<SimpleCounter>());
        assert!(matches!(creator.decision("counter"), Some(ProxyDecision::Proxy { advisors: 1, .. })));
        assert_eq!(creator.decision("timesTen"), None);
    }

    struct Plain;

    #[test]
    fn test_unmatched_bean_is_cached_as_no_proxy() {
        let creator = Arc::new(AutoProxyCreator::new(AdvisorBeansStrategy::new()));
        let (factory, _) = factory_with_advisor(creator.clone());
        let model = BeanClass::<Plain>::builder().default_constructor(|| Plain).build();
        factory
            .register_definition("plain", BeanDefinition::new(model).prototype())
            .unwrap();

        assert!(!factory.get_bean("plain").unwrap().is_proxy());
        assert!(!factory.get_bean("plain").unwrap().is_proxy());
        assert_eq!(creator.decision("plain"), Some(ProxyDecision::NoProxy));
        assert_eq!(creator.advisor_lookups(), 1);
    }

    #[test]
    fn test_common_interceptors_by_bean_name() {
        let factory = DefaultBeanFactory::new(ContainerConfig {
            proxy: ProxyConfig {
                interceptor_names: vec!["timesTen".to_string()],
                ..Default::default()
            },
            ..ContainerConfig::default()
        });
        let interceptor_model = BeanClass::<TimesTen>::builder()
            .implements::<dyn MethodInterceptor>(|interceptor| interceptor)
            .build();
        factory
            .register_singleton(
                "timesTen",
                BeanInstance::of(TimesTen { calls: Mutex::new(Vec::new()) }, interceptor_model),
            )
            .unwrap();
        factory.add_post_processor(Arc::new(AutoProxyCreator::new(BeanNameStrategy::new(["count*"]))));
        factory
            .register_definition("counter", BeanDefinition::new(counter_model()))
            .unwrap();
        factory
            .register_definition("other", BeanDefinition::new(counter_model()))
            .unwrap();

        let counter = factory.get_as::<dyn Counter>("counter").unwrap();
        assert_eq!(counter.next().unwrap(), 10);
        let other = factory.get_as::<dyn Counter>("other").unwrap();
        assert_eq!(other.next().unwrap(), 1);

        let advised = factory.get_as::<dyn Advised>("counter").unwrap();
        assert!(advised.is_frozen());
        assert_eq!(advised.advisors().len(), 1);
    }

    #[test]
    fn test_lazy_target_source_defers_creation() {
        let creator = Arc::new(
            AutoProxyCreator::new(AdvisorBeansStrategy::new())
                .with_target_source_creator(Arc::new(LazyInitTargetSourceCreator)),
        );
        let (factory, _) = factory_with_advisor(creator.clone());
        factory
            .register_definition("lazyCounter", BeanDefinition::new(counter_model()).with_lazy_init(true))
            .unwrap();

        let before = CREATED.load(Ordering::SeqCst);
        let proxy = factory.get_bean("lazyCounter").unwrap();
        assert!(proxy.is_proxy());
        let advised = proxy.cast::<dyn Advised>().unwrap();
        assert!(!advised.target_source().is_static());
        assert!(factory.contains_definition("lazyCounter.ORIGINAL"));
        assert!(!factory.registry().contains_singleton("lazyCounter.ORIGINAL"));

        let counter = proxy.cast::<dyn Counter>().unwrap();
        assert_eq!(counter.next().unwrap(), 10);
        assert!(CREATED.load(Ordering::SeqCst) > before);
        assert!(factory.registry().contains_singleton("lazyCounter.ORIGINAL"));
        assert_eq!(creator.decision("lazyCounter.ORIGINAL"), Some(ProxyDecision::NoProxy));
    }
}
