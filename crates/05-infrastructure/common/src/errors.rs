//! 错误类型定义

use std::fmt;
use thiserror::Error;

/// 回调（构造器、属性写入、方法调用、生命周期钩子）统一使用的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Bean 创建所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationPhase {
    /// 合并定义后处理
    MergedDefinition,
    /// 前置依赖（depends-on）
    DependsOn,
    /// 实例化前的短路处理
    BeforeInstantiation,
    /// 实例化
    Instantiation,
    /// 属性填充
    PopulateProperties,
    /// 初始化
    Initialization,
    /// 循环引用校验
    CircularReferenceCheck,
    /// 销毁回调注册
    DisposalRegistration,
    /// FactoryBean 产品获取
    FactoryBeanObject,
}

impl fmt::Display for CreationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MergedDefinition => "合并定义后处理",
            Self::DependsOn => "前置依赖",
            Self::BeforeInstantiation => "实例化前处理",
            Self::Instantiation => "实例化",
            Self::PopulateProperties => "属性填充",
            Self::Initialization => "初始化",
            Self::CircularReferenceCheck => "循环引用校验",
            Self::DisposalRegistration => "销毁回调注册",
            Self::FactoryBeanObject => "FactoryBean 产品获取",
        };
        f.write_str(label)
    }
}

/// 容器错误类型
#[derive(Error, Debug)]
pub enum BeanError {
    #[error("创建 Bean '{bean_name}' 失败 [{phase}]: {message}")]
    BeanCreation {
        bean_name: String,
        phase: CreationPhase,
        message: String,
        source: Option<BoxError>,
        /// 创建过程中被抑制的相关错误，仅用于诊断
        related_causes: Vec<BeanError>,
    },

    #[error("Bean '{bean_name}' 正在创建中: {message}")]
    CurrentlyInCreation { bean_name: String, message: String },

    #[error("没有可用的 Bean 定义: {message}")]
    NoSuchBeanDefinition {
        name: Option<String>,
        required_type: Option<String>,
        message: String,
    },

    #[error("类型 {required_type} 存在多个候选 Bean: {candidates:?}")]
    NoUniqueBeanDefinition {
        required_type: String,
        candidates: Vec<String>,
    },

    #[error("Bean '{bean_name}' 的依赖无法满足 ({injection_point}): {source}")]
    UnsatisfiedDependency {
        bean_name: String,
        injection_point: String,
        source: Box<BeanError>,
    },

    #[error("无法注册单例 '{bean_name}': 该名称已绑定实例")]
    AlreadyRegistered { bean_name: String },

    #[error("不允许创建 Bean '{bean_name}': 容器正在销毁单例")]
    CreationNotAllowed { bean_name: String },

    #[error("Bean 定义 '{bean_name}' 是抽象的，不能实例化")]
    BeanIsAbstract { bean_name: String },

    #[error("Bean '{bean_name}' 类型不匹配: 期望 {required_type}, 实际 {actual_type}")]
    BeanNotOfRequiredType {
        bean_name: String,
        required_type: String,
        actual_type: String,
    },

    #[error("Bean 定义无效: {bean_name}, 原因: {message}")]
    DefinitionStore { bean_name: String, message: String },

    #[error("不支持的通知类型: {advice}")]
    UnknownAdviceType { advice: String },

    #[error("AOP 配置错误: {message}")]
    AopConfig { message: String },

    #[error("方法调用失败: {method}, 原因: {source}")]
    Invocation { method: String, source: BoxError },
}

impl BeanError {
    /// 创建阶段错误
    pub fn creation(
        bean_name: impl Into<String>,
        phase: CreationPhase,
        message: impl Into<String>,
    ) -> Self {
        Self::BeanCreation {
            bean_name: bean_name.into(),
            phase,
            message: message.into(),
            source: None,
            related_causes: Vec::new(),
        }
    }

    /// 带原因的创建阶段错误
    pub fn creation_caused_by(
        bean_name: impl Into<String>,
        phase: CreationPhase,
        message: impl Into<String>,
        source: BoxError,
    ) -> Self {
        Self::BeanCreation {
            bean_name: bean_name.into(),
            phase,
            message: message.into(),
            source: Some(source),
            related_causes: Vec::new(),
        }
    }

    /// 正在创建中错误
    pub fn currently_in_creation(bean_name: impl Into<String>) -> Self {
        Self::CurrentlyInCreation {
            bean_name: bean_name.into(),
            message: "请求的 Bean 正在创建中: 是否存在无法解析的循环引用?".to_string(),
        }
    }

    /// 按名称查找失败
    pub fn no_such_bean(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::NoSuchBeanDefinition {
            message: format!("名称 '{}'", name),
            name: Some(name),
            required_type: None,
        }
    }

    /// 按类型查找失败
    pub fn no_such_bean_of_type(required_type: impl Into<String>, message: impl Into<String>) -> Self {
        let required_type = required_type.into();
        Self::NoSuchBeanDefinition {
            message: format!("类型 {}: {}", required_type, message.into()),
            name: None,
            required_type: Some(required_type),
        }
    }

    /// 是否属于创建失败族（包括正在创建中）
    pub fn is_bean_creation(&self) -> bool {
        matches!(
            self,
            Self::BeanCreation { .. }
                | Self::CurrentlyInCreation { .. }
                | Self::UnsatisfiedDependency { .. }
                | Self::CreationNotAllowed { .. }
        )
    }

    /// 错误链中是否包含"正在创建中"错误
    pub fn contains_currently_in_creation(&self) -> bool {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            let bean_error = err
                .downcast_ref::<BeanError>()
                .or_else(|| err.downcast_ref::<Box<BeanError>>().map(|boxed| &**boxed));
            if let Some(BeanError::CurrentlyInCreation { .. }) = bean_error {
                return true;
            }
            current = err.source();
        }
        false
    }

    /// 附加被抑制的相关错误
    pub fn add_related_cause(&mut self, cause: BeanError) {
        if let Self::BeanCreation { related_causes, .. } = self {
            related_causes.push(cause);
        }
    }

    /// 相关错误列表
    pub fn related_causes(&self) -> &[BeanError] {
        match self {
            Self::BeanCreation { related_causes, .. } => related_causes,
            _ => &[],
        }
    }
}

/// 事务错误类型
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("无法开启事务: {message}")]
    CannotCreateTransaction {
        message: String,
        source: Option<BoxError>,
    },

    #[error("事务提交失败: {message}")]
    CommitFailed { message: String },

    #[error("事务回滚失败: {message}")]
    RollbackFailed { message: String },

    #[error("未找到事务管理器: {message}")]
    NoTransactionManager { message: String },

    #[error("事务 '{name}' 已被标记为仅回滚")]
    UnexpectedRollback { name: String },
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("容器错误: {source}")]
    BeanError {
        #[from]
        source: BeanError,
    },

    #[error("事务错误: {source}")]
    TransactionError {
        #[from]
        source: TransactionError,
    },

    #[error("生命周期回调失败: {bean_name}, 原因: {source}")]
    LifecycleFailed { bean_name: String, source: BoxError },

    #[error("容器启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("容器关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 结果类型别名
pub type BeanResult<T> = Result<T, BeanError>;
pub type TransactionResult<T> = Result<T, TransactionError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
