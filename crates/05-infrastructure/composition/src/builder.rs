//! 应用上下文构建器

use crate::config_sources::ContainerConfigLoader;
use crate::context::ApplicationContext;
use di_abstractions::{Advisor, BeanDefinition, BeanFactoryAware, BeanInstance, BeanPostProcessor, DefinitionRegistry, Scope, TargetSourceCreator};
use di_impl::aop::{AdvisorBeansStrategy, AutoProxyCreator, BeanNameStrategy};
use di_impl::transaction::{AnnotationTransactionAttributeSource, TransactionAttributeSourceAdvisor, TransactionInterceptor};
use di_impl::{AutowiredPostProcessor, BeanClass, DefaultBeanFactory};
use infrastructure_common::{ContainerConfig, InfrastructureError, InfrastructureResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// 事务通知器注册使用的 Bean 名称
pub const TRANSACTION_ADVISOR_BEAN_NAME: &str = "internalTransactionAdvisor";

/// 应用上下文构建器
///
/// 使用建造者模式收集配置源、Bean 定义、单例、后处理器与作用域，
/// `build` 时按固定顺序注册到新的 Bean 工厂
pub struct ApplicationContextBuilder {
    /// 显式给定的容器配置，优先于配置源
    config: Option<ContainerConfig>,
    config_loader: ContainerConfigLoader,
    logging_enabled: bool,
    logging_config: LoggingConfig,
    definitions: Vec<(String, BeanDefinition)>,
    aliases: Vec<(String, String)>,
    singletons: Vec<(String, BeanInstance)>,
    post_processors: Vec<Arc<dyn BeanPostProcessor>>,
    scopes: Vec<(String, Arc<dyn Scope>)>,
    annotation_config: bool,
    auto_proxy: bool,
    bean_name_patterns: Vec<String>,
    target_source_creators: Vec<Arc<dyn TargetSourceCreator>>,
    transaction_management: bool,
}

impl ApplicationContextBuilder {
    /// 创建构建器，默认不初始化日志
    pub fn new() -> Self {
        Self {
            config: None,
            config_loader: ContainerConfigLoader::new(),
            logging_enabled: false, // 默认不初始化日志
            logging_config: LoggingConfig::default(),
            definitions: Vec::new(),
            aliases: Vec::new(),
            singletons: Vec::new(),
            post_processors: Vec::new(),
            scopes: Vec::new(),
            annotation_config: true,
            auto_proxy: false,
            bean_name_patterns: Vec::new(),
            target_source_creators: Vec::new(),
            transaction_management: false,
        }
    }

    /// 直接指定容器配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 添加 TOML 配置文件
    pub fn add_config_toml<P: AsRef<Path>>(mut self, path: P) -> InfrastructureResult<Self> {
        info!("添加 TOML 配置文件: {}", path.as_ref().display());
        self.config_loader = self.config_loader.add_toml_file(path)?;
        Ok(self)
    }

    /// 添加 JSON 配置文件
    pub fn add_config_json<P: AsRef<Path>>(mut self, path: P) -> InfrastructureResult<Self> {
        info!("添加 JSON 配置文件: {}", path.as_ref().display());
        self.config_loader = self.config_loader.add_json_file(path)?;
        Ok(self)
    }

    /// 添加环境变量配置源
    pub fn add_config_env_vars<S: Into<String>>(mut self, prefix: S) -> Self {
        let prefix = prefix.into();
        info!("添加环境变量配置源，前缀: {}", prefix);
        self.config_loader = self.config_loader.add_environment(prefix);
        self
    }

    /// 使用已组装好的配置加载器
    pub fn with_config_loader(mut self, loader: ContainerConfigLoader) -> Self {
        self.config_loader = loader;
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true;
        self
    }

    /// 注册 Bean 定义
    pub fn register_definition(mut self, name: impl Into<String>, definition: BeanDefinition) -> Self {
        self.definitions.push((name.into(), definition));
        self
    }

    /// 为 Bean 注册别名
    pub fn register_alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.push((name.into(), alias.into()));
        self
    }

    /// 注册已经创建好的单例
    pub fn register_singleton(mut self, name: impl Into<String>, bean: BeanInstance) -> Self {
        self.singletons.push((name.into(), bean));
        self
    }

    /// 追加 Bean 后处理器
    pub fn add_post_processor(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// 注册自定义作用域
    pub fn register_scope(mut self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Self {
        self.scopes.push((name.into(), scope));
        self
    }

    /// 启用或禁用基于自动装配标记的注入
    pub fn annotation_config(mut self, enabled: bool) -> Self {
        self.annotation_config = enabled;
        self
    }

    /// 启用基于通知器 Bean 的自动代理
    pub fn enable_auto_proxy(mut self) -> Self {
        self.auto_proxy = true;
        self
    }

    /// 按 Bean 名称模式自动代理，代理只应用配置中的公共拦截器
    pub fn auto_proxy_bean_names<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bean_name_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// 为自动代理添加目标源创建器
    pub fn with_target_source_creator(mut self, creator: Arc<dyn TargetSourceCreator>) -> Self {
        self.target_source_creators.push(creator);
        self
    }

    /// 启用声明式事务，同时启用自动代理
    pub fn enable_transaction_management(mut self) -> Self {
        self.transaction_management = true;
        self.auto_proxy = true;
        self
    }

    /// 构建尚未刷新的应用上下文
    pub fn build(self) -> InfrastructureResult<ApplicationContext> {
        info!("开始构建应用上下文");

        if self.logging_enabled {
            self.logging_config.initialize()?;
        }

        let config = match self.config {
            Some(config) => {
                crate::config_sources::validate(&config)?;
                config
            }
            None => self.config_loader.load()?,
        };
        debug!("容器配置: {:?}", config);

        let factory = DefaultBeanFactory::new(config);

        for (name, scope) in self.scopes {
            factory.register_scope(&name, scope)?;
        }

        if self.annotation_config {
            factory.add_post_processor(Arc::new(AutowiredPostProcessor::new()));
        }
        if self.auto_proxy {
            let mut creator = AutoProxyCreator::new(AdvisorBeansStrategy::new());
            for target_source_creator in &self.target_source_creators {
                creator = creator.with_target_source_creator(target_source_creator.clone());
            }
            factory.add_post_processor(Arc::new(creator));
        }
        if !self.bean_name_patterns.is_empty() {
            let creator = AutoProxyCreator::new(BeanNameStrategy::new(self.bean_name_patterns));
            factory.add_post_processor(Arc::new(creator));
        }
        for processor in self.post_processors {
            factory.add_post_processor(processor);
        }

        if self.transaction_management {
            let interceptor = Arc::new(TransactionInterceptor::new(Arc::new(
                AnnotationTransactionAttributeSource::new(),
            )));
            interceptor.set_bean_factory(factory.weak_dyn());
            let model = BeanClass::<TransactionAttributeSourceAdvisor>::builder()
                .implements::<dyn Advisor>(|advisor| advisor)
                .build();
            factory.register_singleton(
                TRANSACTION_ADVISOR_BEAN_NAME,
                BeanInstance::of(TransactionAttributeSourceAdvisor::new(interceptor), model),
            )?;
        }

        for (name, definition) in self.definitions {
            factory.register_definition(&name, definition)?;
        }
        for (name, alias) in &self.aliases {
            factory.register_alias(name, alias)?;
        }
        for (name, bean) in self.singletons {
            factory.register_singleton(&name, bean)?;
        }

        info!(
            "应用上下文构建完成, 定义数量: {}, 后处理器: {:?}",
            factory.definition_count(),
            factory.post_processors().names()
        );
        Ok(ApplicationContext::new(factory))
    }

    /// 构建并刷新应用上下文
    pub fn refresh(self) -> InfrastructureResult<ApplicationContext> {
        let context = self.build()?;
        context.refresh()?;
        Ok(context)
    }
}

impl Default for ApplicationContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 安装全局日志订阅者，已经安装过时返回错误
    pub fn initialize(&self) -> InfrastructureResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| InfrastructureError::BootstrapFailed {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}
