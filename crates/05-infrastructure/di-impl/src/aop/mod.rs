//! AOP 支持：通知适配、切点、目标源、动态代理与自动代理创建器

pub mod adapters;
pub mod advisor;
pub mod auto_proxy;
pub mod proxy;
pub mod target_source;

pub use adapters::{
    AfterReturningAdviceAdapter, AfterReturningAdviceInterceptor, BeforeAdviceAdapter, DefaultAdvisorAdapterRegistry,
    MethodBeforeAdviceInterceptor, ThrowsAdviceAdapter, ThrowsAdviceInterceptor,
};
pub use advisor::{simple_match, AnnotationMethodPointcut, DefaultPointcutAdvisor, NameMatchMethodPointcut};
pub use auto_proxy::{
    AdvisorBeansStrategy, AdvisorStrategy, AutoProxyCreator, BeanNameAutoProxyCreator, BeanNameStrategy,
    DefaultAdvisorAutoProxyCreator, ProxyDecision,
};
pub use proxy::{AopProxy, DynamicAopProxyFactory, ReflectiveMethodInvocation};
pub use target_source::{
    LazyInitTargetSource, LazyInitTargetSourceCreator, PrototypeTargetSource, SingletonTargetSource, ORIGINAL_SUFFIX,
};
