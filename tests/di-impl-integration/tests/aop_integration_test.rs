//! 自动代理、事务与应用上下文的集成测试
use di_abstractions::{
    Advice, Advisor, AfterReturningAdvice, Args, BeanDefinition, BeanFactory, BeanFactoryExt, BeanInstance, ComponentModel,
    DefinitionRegistry, DynValue, MethodBeforeAdvice, MethodInfo, PlatformTransactionManager, ThrowsAdvice,
    TransactionDefinition, TransactionStatus,
};
use di_impl::aop::{
    AdvisorBeansStrategy, AutoProxyCreator, DefaultAdvisorAutoProxyCreator, DefaultPointcutAdvisor,
    NameMatchMethodPointcut, ProxyDecision,
};
use di_impl::transaction::TRANSACTIONAL_ANNOTATION;
use di_impl::{BeanClass, DefaultBeanFactory};
use infrastructure_common::{
    Annotation, BoxError, ContainerConfig, DisposableBean, TransactionResult, TypeKey,
};
use infrastructure_composition::{ApplicationContextBuilder, ContextStatus};
use parking_lot::Mutex;
use serde_json::json;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

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

fn advisor_bean(advisor: DefaultPointcutAdvisor) -> BeanInstance {
    let model = BeanClass::<DefaultPointcutAdvisor>::builder()
        .implements::<dyn Advisor>(|advisor| advisor)
        .build();
    BeanInstance::of(advisor, model)
}

struct Greeter;
struct Plain;

fn greeter_model() -> Arc<dyn ComponentModel> {
    BeanClass::<Greeter>::builder()
        .default_constructor(|| Greeter)
        .method("greet", |_, args| {
            let name: String = args.value(0)?;
            Ok(DynValue::Value(json!(format!("hello {name}"))))
        })
        .method("fail", |_, _| Err("拒绝访问".into()))
        .build()
}

fn advised_factory(log: &Arc<Mutex<Vec<String>>>) -> (Arc<DefaultBeanFactory>, Arc<DefaultAdvisorAutoProxyCreator>) {
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    let recorder = Arc::new(Recorder(log.clone()));
    factory
        .register_singleton(
            "beforeAdvisor",
            advisor_bean(
                DefaultPointcutAdvisor::new(Advice::Before(recorder.clone()))
                    .with_pointcut(Arc::new(NameMatchMethodPointcut::new(["greet", "fail"]))),
            ),
        )
        .unwrap();
    factory
        .register_singleton(
            "afterAdvisor",
            advisor_bean(
                DefaultPointcutAdvisor::new(Advice::AfterReturning(recorder.clone()))
                    .with_pointcut(Arc::new(NameMatchMethodPointcut::new(["greet"]))),
            ),
        )
        .unwrap();
    factory
        .register_singleton(
            "throwsAdvisor",
            advisor_bean(
                DefaultPointcutAdvisor::new(Advice::Throws(recorder))
                    .with_pointcut(Arc::new(NameMatchMethodPointcut::new(["fail"]))),
            ),
        )
        .unwrap();

    let creator = Arc::new(AutoProxyCreator::new(AdvisorBeansStrategy::new()));
    factory.add_post_processor(creator.clone());
    factory
        .register_definition("greeter", BeanDefinition::new(greeter_model()).prototype())
        .unwrap();
    let plain = BeanClass::<Plain>::builder().default_constructor(|| Plain).build();
    factory
        .register_definition("plain", BeanDefinition::new(plain).prototype())
        .unwrap();
    (factory, creator)
}

#[test]
fn test_proxied_calls_pass_through_advice_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (factory, _) = advised_factory(&log);

    let greeter = factory.get_bean("greeter").unwrap();
    assert!(greeter.is_proxy());
    assert!(greeter.ultimate_target().downcast::<Greeter>().is_some());

    let greeting = greeter
        .invoke("greet", Args::new(vec![DynValue::Value(json!("lorn"))]))
        .unwrap();
    assert_eq!(greeting.to::<String>().unwrap(), "hello lorn");
    let err = greeter.invoke("fail", Args::empty()).unwrap_err();
    assert_eq!(err.to_string(), "拒绝访问");

    assert_eq!(
        *log.lock(),
        vec!["before:greet", "after:greet", "before:fail", "throws:fail:拒绝访问"]
    );
}

#[test]
fn test_proxy_decision_is_computed_once_per_bean() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (factory, creator) = advised_factory(&log);

    let first = factory.get_bean("greeter").unwrap();
    let first_decision = creator.decision("greeter");
    let second = factory.get_bean("greeter").unwrap();
    assert!(!first.same_instance(&second));
    assert_eq!(creator.decision("greeter"), first_decision);
    assert!(matches!(first_decision, Some(ProxyDecision::Proxy { advisors: 3, .. })));
    assert_eq!(
        creator.proxy_type("greeter").map(|info| info.key),
        Some(TypeKey::of::<Greeter>())
    );
    assert_eq!(creator.advisor_lookups(), 1);

    assert!(!factory.get_bean("plain").unwrap().is_proxy());
    assert!(!factory.get_bean("plain").unwrap().is_proxy());
    assert_eq!(creator.decision("plain"), Some(ProxyDecision::NoProxy));
    assert_eq!(creator.advisor_lookups(), 2);
}

#[derive(Default)]
struct RecordingTransactionManager {
    log: Mutex<Vec<String>>,
}

impl PlatformTransactionManager for RecordingTransactionManager {
    fn begin(&self, definition: &TransactionDefinition) -> TransactionResult<TransactionStatus> {
        self.log.lock().push(format!("begin:{}", definition.name));
        Ok(TransactionStatus {
            name: definition.name.clone(),
            new_transaction: true,
            rollback_only: false,
        })
    }

    fn commit(&self, status: TransactionStatus) -> TransactionResult<()> {
        self.log.lock().push(format!("commit:{}", status.name));
        Ok(())
    }

    fn rollback(&self, status: TransactionStatus) -> TransactionResult<()> {
        self.log.lock().push(format!("rollback:{}", status.name));
        Ok(())
    }
}

struct Inventory {
    destroyed: Arc<AtomicUsize>,
}

impl DisposableBean for Inventory {
    fn destroy(&self) -> Result<(), BoxError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn inventory_definition(destroyed: Arc<AtomicUsize>) -> BeanDefinition {
    let mut reserve = MethodInfo::named("reserve");
    reserve.annotations.push(Annotation::with_attributes(
        TRANSACTIONAL_ANNOTATION,
        json!({ "no_rollback_for": ["库存不足"] }),
    ));
    let model = BeanClass::<Inventory>::builder()
        .default_constructor(move || Inventory {
            destroyed: destroyed.clone(),
        })
        .annotation(Annotation::marker(TRANSACTIONAL_ANNOTATION))
        .method_with(reserve, |_, args| {
            let quantity: i64 = args.value(0)?;
            if quantity > 10 {
                return Err("库存不足".into());
            }
            Ok(DynValue::Value(json!(quantity)))
        })
        .method("release", |_, _| Err("数据库断开".into()))
        .disposable()
        .build();
    BeanDefinition::new(model)
}

#[tokio::test]
async fn test_context_applies_transactions_and_closes_once() -> anyhow::Result<()> {
    let manager = Arc::new(RecordingTransactionManager::default());
    let manager_model = BeanClass::<RecordingTransactionManager>::builder()
        .implements::<dyn PlatformTransactionManager>(|manager| manager)
        .build();
    let destroyed = Arc::new(AtomicUsize::new(0));

    let context = ApplicationContextBuilder::new()
        .register_singleton("transactionManager", BeanInstance::new(manager.clone(), manager_model))
        .register_definition("inventory", inventory_definition(destroyed.clone()))
        .enable_transaction_management()
        .refresh()?;

    let inventory = context.get_bean("inventory")?;
    assert!(inventory.is_proxy());
    assert!(context.factory().contains_definition("inventory"));

    inventory.invoke("reserve", Args::new(vec![DynValue::Value(json!(3))])).unwrap();
    assert!(inventory
        .invoke("reserve", Args::new(vec![DynValue::Value(json!(20))]))
        .is_err());
    assert!(inventory.invoke("release", Args::empty()).is_err());

    assert_eq!(
        *manager.log.lock(),
        vec![
            "begin:Inventory.reserve",
            "commit:Inventory.reserve",
            "begin:Inventory.reserve",
            "commit:Inventory.reserve",
            "begin:Inventory.release",
            "rollback:Inventory.release",
        ]
    );

    context.close().await?;
    context.close().await?;
    assert_eq!(context.status(), ContextStatus::Closed);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    Ok(())
}
