//! 事务拦截器与通知器

use super::attribute::TransactionAttributeSource;
use dashmap::DashMap;
use di_abstractions::{
    Advice, Advisor, AnyClass, BeanFactory, BeanFactoryAware, ClassFilter, ComponentModel, DynValue, MethodInfo,
    MethodInterceptor, MethodInvocation, MethodMatcher, PlatformTransactionManager, Pointcut,
};
use infrastructure_common::{BoxError, TransactionError, TransactionResult, TypeKey, LOWEST_PRECEDENCE};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// 默认事务管理器在缓存中的键
const DEFAULT_MANAGER_KEY: &str = "";

/// 事务拦截器
///
/// 按方法的事务属性开启事务，方法正常返回时提交，出错时按回滚规则回滚或提交。
/// 回滚本身失败只记录日志，调用方收到的始终是方法的原始错误。
pub struct TransactionInterceptor {
    source: Arc<dyn TransactionAttributeSource>,
    factory: RwLock<Option<Weak<dyn BeanFactory>>>,
    managers: DashMap<String, Arc<dyn PlatformTransactionManager>>,
}

impl TransactionInterceptor {
    pub fn new(source: Arc<dyn TransactionAttributeSource>) -> Self {
        Self {
            source,
            factory: RwLock::new(None),
            managers: DashMap::new(),
        }
    }

    /// 直接指定默认事务管理器，不再从容器查找
    pub fn with_transaction_manager(self, manager: Arc<dyn PlatformTransactionManager>) -> Self {
        self.managers.insert(DEFAULT_MANAGER_KEY.to_string(), manager);
        self
    }

    /// 事务属性源
    pub fn attribute_source(&self) -> &Arc<dyn TransactionAttributeSource> {
        &self.source
    }

    fn manager(&self, qualifier: Option<&str>) -> TransactionResult<Arc<dyn PlatformTransactionManager>> {
        let key = qualifier.unwrap_or(DEFAULT_MANAGER_KEY);
        if let Some(manager) = self.managers.get(key) {
            return Ok(manager.value().clone());
        }

        let factory = self
            .factory
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| TransactionError::NoTransactionManager {
                message: "事务拦截器尚未绑定 Bean 工厂".to_string(),
            })?;
        let name = match qualifier {
            Some(name) => name.to_string(),
            None => {
                let mut names =
                    factory.bean_names_for_type(TypeKey::of::<dyn PlatformTransactionManager>(), false, true);
                if names.len() != 1 {
                    return Err(TransactionError::NoTransactionManager {
                        message: format!("需要唯一的事务管理器, 实际找到: {:?}", names),
                    });
                }
                names.remove(0)
            }
        };
        let manager = factory
            .get_bean(&name)
            .ok()
            .and_then(|bean| bean.cast::<dyn PlatformTransactionManager>())
            .ok_or_else(|| TransactionError::NoTransactionManager {
                message: format!("Bean '{}' 不是可用的事务管理器", name),
            })?;
        debug!("事务拦截器使用事务管理器 '{}'", name);
        Ok(self
            .managers
            .entry(key.to_string())
            .or_insert(manager)
            .value()
            .clone())
    }
}

impl BeanFactoryAware for TransactionInterceptor {
    fn set_bean_factory(&self, factory: Weak<dyn BeanFactory>) {
        *self.factory.write() = Some(factory);
    }
}

impl MethodInterceptor for TransactionInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<DynValue, BoxError> {
        let Some(method) = invocation.method_info().cloned() else {
            return invocation.proceed();
        };
        let model = invocation.target().model().clone();
        let Some(attribute) = self.source.attribute(&method, model.as_ref()) else {
            return invocation.proceed();
        };

        let manager = self.manager(attribute.qualifier.as_deref())?;
        let status = manager.begin(&attribute.definition)?;
        trace!("开启事务: {}", attribute.definition.name);

        match invocation.proceed() {
            Ok(value) => {
                if status.rollback_only {
                    let name = status.name.clone();
                    manager.rollback(status)?;
                    return Err(TransactionError::UnexpectedRollback { name }.into());
                }
                manager.commit(status)?;
                trace!("提交事务: {}", attribute.definition.name);
                Ok(value)
            }
            Err(err) => {
                if attribute.rollback_on(&*err) {
                    debug!("事务 {} 因错误回滚: {}", attribute.definition.name, err);
                    if let Err(rollback_err) = manager.rollback(status) {
                        warn!("事务 {} 回滚失败: {}", attribute.definition.name, rollback_err);
                    }
                } else if let Err(commit_err) = manager.commit(status) {
                    warn!("事务 {} 提交失败: {}", attribute.definition.name, commit_err);
                }
                Err(err)
            }
        }
    }
}

/// 匹配具有事务属性的方法
struct TransactionAttributeSourcePointcut {
    source: Arc<dyn TransactionAttributeSource>,
}

impl MethodMatcher for TransactionAttributeSourcePointcut {
    fn matches(&self, method: &MethodInfo, model: &dyn ComponentModel) -> bool {
        self.source.attribute(method, model).is_some()
    }
}

impl Pointcut for TransactionAttributeSourcePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &AnyClass
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}

/// 事务通知器
pub struct TransactionAttributeSourceAdvisor {
    interceptor: Arc<TransactionInterceptor>,
    pointcut: TransactionAttributeSourcePointcut,
    order: i32,
}

impl TransactionAttributeSourceAdvisor {
    pub fn new(interceptor: Arc<TransactionInterceptor>) -> Self {
        let source = interceptor.attribute_source().clone();
        Self {
            interceptor,
            pointcut: TransactionAttributeSourcePointcut { source },
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn interceptor(&self) -> &Arc<TransactionInterceptor> {
        &self.interceptor
    }
}

impl Advisor for TransactionAttributeSourceAdvisor {
    fn advice(&self) -> Advice {
        Advice::Around(self.interceptor.clone())
    }

    fn pointcut(&self) -> Option<&dyn Pointcut> {
        Some(&self.pointcut)
    }

    fn order(&self) -> i32 {
        self.order
    }
}
