//! AOP 抽象接口
//!
//! 通知（advice）、通知器（advisor）、切点、拦截器链与代理工厂的契约。
//! 代理的具体生成方式隐藏在 [`AopProxyFactory`] 之后。

use crate::factory::BeanFactory;
use crate::model::{BeanInstance, ComponentModel, MethodInfo, ObjectRef};
use crate::value::{Args, DynValue};
use infrastructure_common::{BeanResult, BoxError, LOWEST_PRECEDENCE};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// 方法调用
///
/// 拦截器通过 [`MethodInvocation::proceed`] 把调用交给链上的下一个拦截器，
/// 链尾调用目标对象
pub trait MethodInvocation {
    /// 方法名称
    fn method(&self) -> &str;

    /// 方法描述
    fn method_info(&self) -> Option<&MethodInfo>;

    /// 调用参数
    fn arguments(&self) -> &Args;

    /// 可修改的调用参数
    fn arguments_mut(&mut self) -> &mut Args;

    /// 目标对象
    fn target(&self) -> &BeanInstance;

    /// 继续调用
    fn proceed(&mut self) -> Result<DynValue, BoxError>;
}

/// 方法拦截器（环绕通知）
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> Result<DynValue, BoxError>;
}

/// 前置通知
pub trait MethodBeforeAdvice: Send + Sync {
    fn before(&self, method: &str, args: &Args, target: &BeanInstance) -> Result<(), BoxError>;
}

/// 返回后通知
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(
        &self,
        result: &DynValue,
        method: &str,
        args: &Args,
        target: &BeanInstance,
    ) -> Result<(), BoxError>;
}

/// 异常通知
///
/// 处理完成后原异常继续抛出；处理过程本身失败时以新错误替换原异常
pub trait ThrowsAdvice: Send + Sync {
    /// 是否处理该异常
    fn handles(&self, _error: &(dyn Error + 'static)) -> bool {
        true
    }

    fn after_throwing(
        &self,
        method: &str,
        args: &Args,
        target: &BeanInstance,
        error: &(dyn Error + 'static),
    ) -> Result<(), BoxError>;
}

/// 通知
#[derive(Clone)]
pub enum Advice {
    /// 环绕
    Around(Arc<dyn MethodInterceptor>),
    /// 前置
    Before(Arc<dyn MethodBeforeAdvice>),
    /// 返回后
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    /// 异常
    Throws(Arc<dyn ThrowsAdvice>),
    /// 由自定义适配器处理的通知
    Custom { kind: String, advice: ObjectRef },
}

impl Advice {
    /// 通知种类
    pub fn kind(&self) -> &str {
        match self {
            Self::Around(_) => "around",
            Self::Before(_) => "before",
            Self::AfterReturning(_) => "after-returning",
            Self::Throws(_) => "throws",
            Self::Custom { kind, .. } => kind,
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice({})", self.kind())
    }
}

/// 类过滤器
pub trait ClassFilter: Send + Sync {
    fn matches(&self, model: &dyn ComponentModel) -> bool;
}

/// 方法匹配器
pub trait MethodMatcher: Send + Sync {
    fn matches(&self, method: &MethodInfo, model: &dyn ComponentModel) -> bool;
}

/// 匹配全部类
pub struct AnyClass;

impl ClassFilter for AnyClass {
    fn matches(&self, _model: &dyn ComponentModel) -> bool {
        true
    }
}

/// 匹配全部方法
pub struct AnyMethod;

impl MethodMatcher for AnyMethod {
    fn matches(&self, _method: &MethodInfo, _model: &dyn ComponentModel) -> bool {
        true
    }
}

/// 切点
pub trait Pointcut: Send + Sync {
    fn class_filter(&self) -> &dyn ClassFilter;

    fn method_matcher(&self) -> &dyn MethodMatcher;
}

/// 切点能否作用于类型：类过滤通过且至少一个方法匹配
pub fn can_apply(pointcut: &dyn Pointcut, model: &dyn ComponentModel) -> bool {
    if !pointcut.class_filter().matches(model) {
        return false;
    }
    model
        .methods()
        .iter()
        .any(|method| pointcut.method_matcher().matches(method, model))
}

/// 通知器
///
/// 没有切点的通知器作用于全部类型的全部方法
pub trait Advisor: Send + Sync {
    fn advice(&self) -> Advice;

    fn pointcut(&self) -> Option<&dyn Pointcut> {
        None
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// 通知器能否作用于类型
pub fn advisor_can_apply(advisor: &dyn Advisor, model: &dyn ComponentModel) -> bool {
    match advisor.pointcut() {
        Some(pointcut) => can_apply(pointcut, model),
        None => true,
    }
}

/// 通知适配器：把某一种通知转换为统一的拦截器契约
pub trait AdvisorAdapter: Send + Sync {
    fn supports_advice(&self, advice: &Advice) -> bool;

    fn interceptor(&self, advisor: &dyn Advisor) -> Option<Arc<dyn MethodInterceptor>>;
}

/// 通知适配器注册表
pub trait AdvisorAdapterRegistry: Send + Sync {
    /// 把通知 Bean 包装为通知器
    fn wrap(&self, advice: &BeanInstance) -> BeanResult<Arc<dyn Advisor>>;

    /// 把通知包装为作用于全部方法的通知器
    fn wrap_advice(&self, advice: Advice) -> BeanResult<Arc<dyn Advisor>>;

    /// 通知器对应的拦截器
    fn interceptors(&self, advisor: &dyn Advisor) -> BeanResult<Vec<Arc<dyn MethodInterceptor>>>;

    /// 注册适配器
    fn register_adapter(&self, adapter: Arc<dyn AdvisorAdapter>);
}

/// 目标源
///
/// 代理每次调用前取得目标，调用后归还
pub trait TargetSource: Send + Sync {
    /// 目标的组件模型
    fn target_model(&self) -> Arc<dyn ComponentModel>;

    /// 每次是否返回同一个目标
    fn is_static(&self) -> bool {
        false
    }

    /// 取得目标
    fn get_target(&self) -> BeanResult<BeanInstance>;

    /// 归还目标
    fn release_target(&self, _target: &BeanInstance) {}
}

/// 自定义目标源创建器
pub trait TargetSourceCreator: Send + Sync {
    fn target_source(
        &self,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
        factory: &Arc<dyn BeanFactory>,
    ) -> BeanResult<Option<Arc<dyn TargetSource>>>;
}

/// 代理配置
#[derive(Clone)]
pub struct AdvisedSupport {
    /// 目标源
    pub target_source: Arc<dyn TargetSource>,
    /// 有序通知器
    pub advisors: Vec<Arc<dyn Advisor>>,
    /// 通知适配器
    pub adapters: Arc<dyn AdvisorAdapterRegistry>,
    /// 创建后是否禁止修改通知器
    pub frozen: bool,
}

/// 代理的运行时配置视图
pub trait Advised: Send + Sync {
    /// 当前通知器
    fn advisors(&self) -> Vec<Arc<dyn Advisor>>;

    /// 追加通知器；冻结的代理拒绝修改
    fn add_advisor(&self, advisor: Arc<dyn Advisor>) -> BeanResult<()>;

    /// 是否冻结
    fn is_frozen(&self) -> bool;

    /// 目标源
    fn target_source(&self) -> Arc<dyn TargetSource>;
}

/// 代理工厂
pub trait AopProxyFactory: Send + Sync {
    fn create_proxy(&self, config: AdvisedSupport) -> BeanResult<BeanInstance>;
}

/// AOP 基础设施标记，带有该能力的 Bean 不会被自动代理
pub trait AopInfrastructureBean: Send + Sync {}
