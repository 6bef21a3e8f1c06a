//! 通知适配器
//!
//! 前置、返回后、异常三种通知各有一个适配器，把通知转换为环绕拦截器。

use super::advisor::DefaultPointcutAdvisor;
use di_abstractions::{
    Advice, AdvisorAdapter, AdvisorAdapterRegistry, Advisor, AfterReturningAdvice, BeanInstance,
    MethodBeforeAdvice, MethodInterceptor, MethodInvocation, ThrowsAdvice, DynValue,
};
use infrastructure_common::{BeanError, BeanResult, BoxError};
use parking_lot::RwLock;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, trace};

/// 前置通知拦截器
pub struct MethodBeforeAdviceInterceptor {
    advice: Arc<dyn MethodBeforeAdvice>,
}

impl MethodBeforeAdviceInterceptor {
    pub fn new(advice: Arc<dyn MethodBeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for MethodBeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<DynValue, BoxError> {
        self.advice
            .before(invocation.method(), invocation.arguments(), invocation.target())?;
        invocation.proceed()
    }
}

/// 返回后通知拦截器，只在正常返回时触发
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdviceInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<DynValue, BoxError> {
        let result = invocation.proceed()?;
        self.advice.after_returning(
            &result,
            invocation.method(),
            invocation.arguments(),
            invocation.target(),
        )?;
        Ok(result)
    }
}

/// 异常通知拦截器
pub struct ThrowsAdviceInterceptor {
    advice: Arc<dyn ThrowsAdvice>,
}

impl ThrowsAdviceInterceptor {
    pub fn new(advice: Arc<dyn ThrowsAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<DynValue, BoxError> {
        match invocation.proceed() {
            Ok(result) => Ok(result),
            Err(err) => {
                let error: &(dyn Error + 'static) = &*err;
                if self.advice.handles(error) {
                    trace!("异常通知处理方法 '{}' 的错误: {}", invocation.method(), err);
                    self.advice.after_throwing(
                        invocation.method(),
                        invocation.arguments(),
                        invocation.target(),
                        error,
                    )?;
                }
                Err(err)
            }
        }
    }
}

/// 前置通知适配器
pub struct BeforeAdviceAdapter;

impl AdvisorAdapter for BeforeAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Before(_))
    }

    fn interceptor(&self, advisor: &dyn Advisor) -> Option<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::Before(advice) => Some(Arc::new(MethodBeforeAdviceInterceptor::new(advice))),
            _ => None,
        }
    }
}

/// 返回后通知适配器
pub struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterReturning(_))
    }

    fn interceptor(&self, advisor: &dyn Advisor) -> Option<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::AfterReturning(advice) => Some(Arc::new(AfterReturningAdviceInterceptor::new(advice))),
            _ => None,
        }
    }
}

/// 异常通知适配器
pub struct ThrowsAdviceAdapter;

impl AdvisorAdapter for ThrowsAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Throws(_))
    }

    fn interceptor(&self, advisor: &dyn Advisor) -> Option<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::Throws(advice) => Some(Arc::new(ThrowsAdviceInterceptor::new(advice))),
            _ => None,
        }
    }
}

/// 默认通知适配器注册表，预置三种内建适配器
pub struct DefaultAdvisorAdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AdvisorAdapter>>>,
}

impl DefaultAdvisorAdapterRegistry {
    pub fn new() -> Self {
        let adapters: Vec<Arc<dyn AdvisorAdapter>> = vec![
            Arc::new(BeforeAdviceAdapter),
            Arc::new(AfterReturningAdviceAdapter),
            Arc::new(ThrowsAdviceAdapter),
        ];
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    fn supports(&self, advice: &Advice) -> bool {
        self.adapters
            .read()
            .iter()
            .any(|adapter| adapter.supports_advice(advice))
    }
}

impl Default for DefaultAdvisorAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorAdapterRegistry for DefaultAdvisorAdapterRegistry {
    fn wrap(&self, advice: &BeanInstance) -> BeanResult<Arc<dyn Advisor>> {
        if let Some(advisor) = advice.cast::<dyn Advisor>() {
            return Ok(advisor);
        }
        let advice = if let Some(interceptor) = advice.cast::<dyn MethodInterceptor>() {
            Advice::Around(interceptor)
        } else if let Some(before) = advice.cast::<dyn MethodBeforeAdvice>() {
            Advice::Before(before)
        } else if let Some(after) = advice.cast::<dyn AfterReturningAdvice>() {
            Advice::AfterReturning(after)
        } else if let Some(throws) = advice.cast::<dyn ThrowsAdvice>() {
            Advice::Throws(throws)
        } else {
            return Err(BeanError::UnknownAdviceType {
                advice: advice.type_info().name.clone(),
            });
        };
        self.wrap_advice(advice)
    }

    fn wrap_advice(&self, advice: Advice) -> BeanResult<Arc<dyn Advisor>> {
        if matches!(advice, Advice::Around(_)) || self.supports(&advice) {
            return Ok(Arc::new(DefaultPointcutAdvisor::new(advice)));
        }
        Err(BeanError::UnknownAdviceType {
            advice: advice.kind().to_string(),
        })
    }

    fn interceptors(&self, advisor: &dyn Advisor) -> BeanResult<Vec<Arc<dyn MethodInterceptor>>> {
        let advice = advisor.advice();
        let mut interceptors = Vec::new();
        if let Advice::Around(interceptor) = &advice {
            interceptors.push(interceptor.clone());
        }
        for adapter in self.adapters.read().iter() {
            if adapter.supports_advice(&advice) {
                interceptors.extend(adapter.interceptor(advisor));
            }
        }
        if interceptors.is_empty() {
            return Err(BeanError::UnknownAdviceType {
                advice: advice.kind().to_string(),
            });
        }
        Ok(interceptors)
    }

    fn register_adapter(&self, adapter: Arc<dyn AdvisorAdapter>) {
        debug!("注册通知适配器");
        self.adapters.write().push(adapter);
    }
}
