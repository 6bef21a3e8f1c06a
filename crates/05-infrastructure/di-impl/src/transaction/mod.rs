//! 声明式事务
//!
//! 事务属性来自方法或类上的 `transactional` 注解，由 [`TransactionInterceptor`]
//! 在代理的调用链上开启、提交或回滚事务。

pub mod attribute;
pub mod interceptor;

pub use attribute::{
    AnnotationTransactionAttributeSource, RollbackRule, TransactionAttribute, TransactionAttributeSource,
    TRANSACTIONAL_ANNOTATION,
};
pub use interceptor::{TransactionAttributeSourceAdvisor, TransactionInterceptor};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::{AdvisorBeansStrategy, AutoProxyCreator};
    use crate::component_model::BeanClass;
    use crate::factory::DefaultBeanFactory;
    use di_abstractions::{
        Advisor, Args, BeanDefinition, BeanFactory, BeanFactoryAware, BeanFactoryExt, BeanInstance, ComponentModel,
        DefinitionRegistry,
        DynValue, MethodInfo, PlatformTransactionManager, TransactionDefinition, TransactionStatus,
    };
    use infrastructure_common::{Annotation, BoxError, ContainerConfig, TransactionResult};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

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

    struct Ledger;

    fn transactional(name: &str, attributes: serde_json::Value) -> MethodInfo {
        let mut info = MethodInfo::named(name);
        info.annotations
            .push(Annotation::with_attributes(TRANSACTIONAL_ANNOTATION, attributes));
        info
    }

    fn ledger_model() -> Arc<dyn ComponentModel> {
        let post = transactional("post", json!({}));
        let reject = transactional("reject", json!({ "no_rollback_for": ["已拒绝"] }));
        BeanClass::<Ledger>::builder()
            .default_constructor(|| Ledger)
            .method_with(post, |_, args| {
                let amount: i64 = args.value(0)?;
                if amount < 0 {
                    return Err(format!("金额无效: {}", amount).into());
                }
                Ok(DynValue::Value(amount.into()))
            })
            .method_with(reject, |_, _| Err(BoxError::from("已拒绝")))
            .method("audit", |_, _| Ok(DynValue::Null))
            .build()
    }

    fn setup() -> (Arc<DefaultBeanFactory>, Arc<RecordingTransactionManager>) {
        let factory = DefaultBeanFactory::new(ContainerConfig::default());
        let manager = Arc::new(RecordingTransactionManager::default());
        let manager_model = BeanClass::<RecordingTransactionManager>::builder()
            .implements::<dyn PlatformTransactionManager>(|manager| manager)
            .build();
        factory
            .register_singleton("transactionManager", BeanInstance::new(manager.clone(), manager_model))
            .unwrap();

        let interceptor = Arc::new(TransactionInterceptor::new(Arc::new(
            AnnotationTransactionAttributeSource::new(),
        )));
        interceptor.set_bean_factory(factory.weak_dyn());
        let advisor_model = BeanClass::<TransactionAttributeSourceAdvisor>::builder()
            .implements::<dyn Advisor>(|advisor| advisor)
            .build();
        factory
            .register_singleton(
                "transactionAdvisor",
                BeanInstance::of(TransactionAttributeSourceAdvisor::new(interceptor), advisor_model),
            )
            .unwrap();
        factory.add_post_processor(Arc::new(AutoProxyCreator::new(AdvisorBeansStrategy::new())));
        factory
            .register_definition("ledger", BeanDefinition::new(ledger_model()))
            .unwrap();
        (factory, manager)
    }

    fn amount(value: i64) -> Args {
        Args::new(vec![DynValue::Value(value.into())])
    }

    #[test]
    fn test_commit_on_success_and_rollback_on_error() {
        let (factory, manager) = setup();
        let ledger = factory.get_bean("ledger").unwrap();
        assert!(ledger.is_proxy());

        assert_eq!(ledger.invoke("post", amount(5)).unwrap().to::<i64>().unwrap(), 5);
        assert!(ledger.invoke("post", amount(-1)).is_err());
        ledger.invoke("audit", Args::empty()).unwrap();

        assert_eq!(
            *manager.log.lock(),
            vec![
                "begin:Ledger.post",
                "commit:Ledger.post",
                "begin:Ledger.post",
                "rollback:Ledger.post",
            ]
        );
    }

    #[test]
    fn test_no_rollback_rule_commits_and_keeps_error() {
        let (factory, manager) = setup();
        let ledger = factory.get_bean("ledger").unwrap();

        let err = ledger.invoke("reject", Args::empty()).unwrap_err();
        assert_eq!(err.to_string(), "已拒绝");
        assert_eq!(*manager.log.lock(), vec!["begin:Ledger.reject", "commit:Ledger.reject"]);
        assert!(factory.get_typed::<Ledger>("ledger").is_err());
    }
}
