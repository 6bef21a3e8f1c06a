//! # 基础设施组合层
//!
//! 把 Bean 工厂、后处理器、自动代理与声明式事务组装成可运行的应用上下文。
//!
//! ## 主要功能
//!
//! - **应用上下文构建器**: 收集配置源、Bean 定义与扩展点
//! - **配置源**: 从 TOML/JSON 文件与 `LORN_IOC_` 环境变量加载容器配置
//! - **应用上下文**: 刷新、`Lifecycle` Bean 启停与关闭
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::{ApplicationContextBuilder, LoggingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ApplicationContextBuilder::new()
//!         .add_config_env_vars("LORN_IOC")
//!         .with_logging(LoggingConfig::development())
//!         .enable_transaction_management()
//!         .refresh()?;
//!
//!     context.start().await?;
//!     context.wait_for_shutdown_signal().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config_sources;
pub mod context;


pub use builder::{ApplicationContextBuilder, LoggingConfig, TRANSACTION_ADVISOR_BEAN_NAME};
pub use config_sources::{ConfigSource, ContainerConfigLoader, DEFAULT_ENV_PREFIX};
pub use context::{ApplicationContext, ContextStats, ContextStatus};

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
