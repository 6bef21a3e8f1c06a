//! 动态代理
//!
//! [`AopProxy`] 同时充当代理对象与它的组件模型：方法调用经过按方法缓存的
//! 拦截器链，链尾落到目标的组件模型上。

use dashmap::DashMap;
use di_abstractions::{
    Advised, AdvisedSupport, Advisor, AdvisorAdapterRegistry, AopProxyFactory, Args, BeanInstance,
    ComponentModel, ConstructorInfo, DynValue, MethodInfo, MethodInterceptor, MethodInvocation, ObjectRef,
    PropertyInfo, TargetSource,
};
use infrastructure_common::{Annotations, BeanError, BeanResult, BoxError, TypeInfo, TypeKey};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

type InterceptorChain = Arc<Vec<Arc<dyn MethodInterceptor>>>;

/// 拦截器链上的一次方法调用
pub struct ReflectiveMethodInvocation<'a> {
    target: BeanInstance,
    method: String,
    method_info: Option<&'a MethodInfo>,
    args: Args,
    interceptors: &'a [Arc<dyn MethodInterceptor>],
    index: usize,
}

impl<'a> ReflectiveMethodInvocation<'a> {
    pub fn new(
        target: BeanInstance,
        method: impl Into<String>,
        method_info: Option<&'a MethodInfo>,
        args: Args,
        interceptors: &'a [Arc<dyn MethodInterceptor>],
    ) -> Self {
        Self {
            target,
            method: method.into(),
            method_info,
            args,
            interceptors,
            index: 0,
        }
    }
}

impl MethodInvocation for ReflectiveMethodInvocation<'_> {
    fn method(&self) -> &str {
        &self.method
    }

    fn method_info(&self) -> Option<&MethodInfo> {
        self.method_info
    }

    fn arguments(&self) -> &Args {
        &self.args
    }

    fn arguments_mut(&mut self) -> &mut Args {
        &mut self.args
    }

    fn target(&self) -> &BeanInstance {
        &self.target
    }

    fn proceed(&mut self) -> Result<DynValue, BoxError> {
        let interceptors = self.interceptors;
        match interceptors.get(self.index) {
            Some(interceptor) => {
                self.index += 1;
                interceptor.invoke(self)
            }
            None => self.target.invoke(&self.method, self.args.clone()),
        }
    }
}

/// 代理
pub struct AopProxy {
    self_ref: Weak<AopProxy>,
    target_source: Arc<dyn TargetSource>,
    target_model: Arc<dyn ComponentModel>,
    advisors: RwLock<Vec<Arc<dyn Advisor>>>,
    adapters: Arc<dyn AdvisorAdapterRegistry>,
    frozen: bool,
    chains: DashMap<String, InterceptorChain>,
}

impl AopProxy {
    /// 按配置创建代理
    pub fn new(config: AdvisedSupport) -> Arc<Self> {
        let target_model = config.target_source.target_model();
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            target_source: config.target_source,
            target_model,
            advisors: RwLock::new(config.advisors),
            adapters: config.adapters,
            frozen: config.frozen,
            chains: DashMap::new(),
        })
    }

    /// 代理对应的 Bean 实例
    pub fn instance(self: &Arc<Self>) -> BeanInstance {
        let object: ObjectRef = self.clone();
        let model: Arc<dyn ComponentModel> = self.clone();
        BeanInstance::new(object, model)
    }

    fn self_instance(&self) -> Option<BeanInstance> {
        self.self_ref.upgrade().map(|proxy| proxy.instance())
    }

    /// 方法的拦截器链
    fn chain_for(&self, method: &str) -> Result<InterceptorChain, BoxError> {
        if let Some(chain) = self.chains.get(method) {
            return Ok(chain.value().clone());
        }
        let method_info = self.target_model.method(method);
        let mut interceptors = Vec::new();
        for advisor in self.advisors.read().iter() {
            let applies = match (advisor.pointcut(), method_info) {
                (None, _) => true,
                (Some(pointcut), Some(info)) => {
                    pointcut.class_filter().matches(self.target_model.as_ref())
                        && pointcut.method_matcher().matches(info, self.target_model.as_ref())
                }
                (Some(_), None) => false,
            };
            if applies {
                interceptors.extend(self.adapters.interceptors(advisor.as_ref())?);
            }
        }
        trace!(
            "{}.{} 的拦截器数量: {}",
            self.target_model.type_info().short_name(),
            method,
            interceptors.len()
        );
        let chain = Arc::new(interceptors);
        self.chains.insert(method.to_string(), chain.clone());
        Ok(chain)
    }

    fn invoke_method(&self, method: &str, args: Args) -> Result<DynValue, BoxError> {
        let chain = self.chain_for(method)?;
        let target = self.target_source.get_target()?;
        let result = if chain.is_empty() {
            target.invoke(method, args)
        } else {
            let method_info = self.target_model.method(method);
            ReflectiveMethodInvocation::new(target.clone(), method, method_info, args, &chain).proceed()
        };
        self.target_source.release_target(&target);
        result
    }
}

impl ComponentModel for AopProxy {
    fn type_info(&self) -> &TypeInfo {
        self.target_model.type_info()
    }

    fn is_assignable_to(&self, key: TypeKey) -> bool {
        key == TypeKey::of::<dyn Advised>() || key == TypeKey::of::<AopProxy>() || self.target_model.is_assignable_to(key)
    }

    /// 优先使用目标声明的代理视图；没有代理视图的 trait 直接转换到静态目标上，不经过拦截器
    fn cast(&self, object: &ObjectRef, key: TypeKey) -> Option<Box<dyn Any + Send + Sync>> {
        let proxy = object.clone().downcast::<AopProxy>().ok()?;
        if key == TypeKey::of::<AopProxy>() {
            return Some(Box::new(proxy));
        }
        if key == TypeKey::of::<dyn Advised>() {
            let advised: Arc<dyn Advised> = proxy;
            return Some(Box::new(advised));
        }
        if let Some(view) = self
            .self_instance()
            .and_then(|instance| self.target_model.proxy_view(key, &instance))
        {
            return Some(view);
        }
        if !self.target_source.is_static() {
            return None;
        }
        let target = self.target_source.get_target().ok()?;
        target.model().cast(target.object(), key)
    }

    fn constructors(&self) -> &[ConstructorInfo] {
        &[]
    }

    fn instantiate(&self, _index: usize, _args: Args) -> Result<ObjectRef, BoxError> {
        Err(format!("代理 {} 不能实例化", self.target_model.type_info()).into())
    }

    fn properties(&self) -> &[PropertyInfo] {
        self.target_model.properties()
    }

    fn set_property(&self, _object: &ObjectRef, name: &str, value: DynValue) -> Result<(), BoxError> {
        let target = self.target_source.get_target()?;
        let result = target.set_property(name, value);
        self.target_source.release_target(&target);
        result
    }

    fn methods(&self) -> &[MethodInfo] {
        self.target_model.methods()
    }

    fn invoke(&self, _object: &ObjectRef, method: &str, args: Args) -> Result<DynValue, BoxError> {
        self.invoke_method(method, args)
    }

    fn annotations(&self) -> &Annotations {
        self.target_model.annotations()
    }

    fn target_of(&self, _object: &ObjectRef) -> Option<BeanInstance> {
        if !self.target_source.is_static() {
            return None;
        }
        self.target_source.get_target().ok()
    }

    fn is_proxy(&self) -> bool {
        true
    }
}

impl Advised for AopProxy {
    fn advisors(&self) -> Vec<Arc<dyn Advisor>> {
        self.advisors.read().clone()
    }

    fn add_advisor(&self, advisor: Arc<dyn Advisor>) -> BeanResult<()> {
        if self.frozen {
            return Err(BeanError::AopConfig {
                message: format!("{} 的代理已冻结，不能修改通知器", self.target_model.type_info()),
            });
        }
        self.advisors.write().push(advisor);
        self.chains.clear();
        Ok(())
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn target_source(&self) -> Arc<dyn TargetSource> {
        self.target_source.clone()
    }
}

/// 默认代理工厂
#[derive(Default)]
pub struct DynamicAopProxyFactory;

impl AopProxyFactory for DynamicAopProxyFactory {
    fn create_proxy(&self, config: AdvisedSupport) -> BeanResult<BeanInstance> {
        if config.advisors.is_empty() {
            warn!(
                "为 {} 创建了没有通知器的代理",
                config.target_source.target_model().type_info()
            );
        }
        Ok(AopProxy::new(config).instance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::{DefaultAdvisorAdapterRegistry, DefaultPointcutAdvisor, NameMatchMethodPointcut, SingletonTargetSource};
    use crate::component_model::BeanClass;
    use di_abstractions::{Advice, AfterReturningAdvice, MethodBeforeAdvice, ThrowsAdvice};
    use parking_lot::Mutex;
    use std::error::Error;

    trait Greeter: Send + Sync {
        fn greet(&self, name: &str) -> Result<String, BoxError>;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self, name: &str) -> Result<String, BoxError> {
            Ok(format!("hello {name}"))
        }
    }

    /// 经由代理调用的视图
    struct GreeterProxy(BeanInstance);

    impl Greeter for GreeterProxy {
        fn greet(&self, name: &str) -> Result<String, BoxError> {
            self.0
                .invoke("greet", Args::new(vec![DynValue::Value(name.into())]))?
                .to::<String>()
        }
    }

    fn english_model() -> Arc<dyn ComponentModel> {
        BeanClass::<English>::builder()
            .default_constructor(|| English)
            .implements::<dyn Greeter>(|bean| bean)
            .proxy_view::<dyn Greeter>(|proxy| Arc::new(GreeterProxy(proxy)))
            .method("greet", |english, args| {
                let name: String = args.value(0)?;
                Ok(DynValue::Value(english.greet(&name)?.into()))
            })
            .method("fail", |_, _| Err("失败".into()))
            .build()
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl MethodBeforeAdvice for Recorder {
        fn before(&self, method: &str, _args: &Args, _target: &BeanInstance) -> Result<(), BoxError> {
            self.0.lock().push(format!("before:{method}"));
            Ok(())
        }
    }

    impl AfterReturningAdvice for Recorder {
        fn after_returning(
            &self,
            _result: &DynValue,
            method: &str,
            _args: &Args,
            _target: &BeanInstance,
        ) -> Result<(), BoxError> {
            self.0.lock().push(format!("after:{method}"));
            Ok(())
        }
    }

    impl ThrowsAdvice for Recorder {
        fn after_throwing(
            &self,
            method: &str,
            _args: &Args,
            _target: &BeanInstance,
            error: &(dyn Error + 'static),
        ) -> Result<(), BoxError> {
            self.0.lock().push(format!("throws:{method}:{error}"));
            Ok(())
        }
    }

    fn proxy_with(log: Arc<Mutex<Vec<String>>>, frozen: bool) -> BeanInstance {
        let recorder = Arc::new(Recorder(log));
        let target = BeanInstance::of(English, english_model());
        let advisors: Vec<Arc<dyn Advisor>> = vec![
            Arc::new(DefaultPointcutAdvisor::new(Advice::Before(recorder.clone()))),
            Arc::new(DefaultPointcutAdvisor::new(Advice::AfterReturning(recorder.clone()))),
            Arc::new(
                DefaultPointcutAdvisor::new(Advice::Throws(recorder))
                    .with_pointcut(Arc::new(NameMatchMethodPointcut::new(["fail"]))),
            ),
        ];
        DynamicAopProxyFactory
            .create_proxy(AdvisedSupport {
                target_source: Arc::new(SingletonTargetSource::new(target)),
                advisors,
                adapters: Arc::new(DefaultAdvisorAdapterRegistry::new()),
                frozen,
            })
            .unwrap()
    }

    #[test]
    fn test_proxy_dispatches_through_adapters_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = proxy_with(log.clone(), true);

        let greeter = proxy.cast::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet("lorn").unwrap(), "hello lorn");
        assert!(proxy.invoke("fail", Args::empty()).is_err());

        assert_eq!(
            *log.lock(),
            vec!["before:greet", "after:greet", "before:fail", "throws:fail:失败"]
        );
    }

    #[test]
    fn test_proxy_exposes_target_and_types() {
        let proxy = proxy_with(Arc::new(Mutex::new(Vec::new())), true);

        assert!(proxy.is_proxy());
        assert!(proxy.is_assignable_to(TypeKey::of::<dyn Greeter>()));
        assert!(proxy.is_assignable_to(TypeKey::of::<English>()));
        assert!(proxy.ultimate_target().downcast::<English>().is_some());
        assert!(proxy.downcast::<English>().is_none());
    }

    #[test]
    fn test_frozen_proxy_rejects_new_advisors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let frozen = proxy_with(log.clone(), true);
        let advised = frozen.cast::<dyn Advised>().unwrap();
        let advisor: Arc<dyn Advisor> =
            Arc::new(DefaultPointcutAdvisor::new(Advice::Before(Arc::new(Recorder(log.clone())))));
        assert!(advised.add_advisor(advisor.clone()).is_err());

        let open = proxy_with(log.clone(), false);
        let advised = open.cast::<dyn Advised>().unwrap();
        open.invoke("greet", Args::new(vec![DynValue::Value("a".into())])).unwrap();
        advised.add_advisor(advisor).unwrap();
        log.lock().clear();
        open.invoke("greet", Args::new(vec![DynValue::Value("a".into())])).unwrap();
        assert_eq!(*log.lock(), vec!["before:greet", "before:greet", "after:greet"]);
    }
}
