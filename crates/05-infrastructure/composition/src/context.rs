//! 应用上下文

use crate::builder::ApplicationContextBuilder;
use chrono::{DateTime, Utc};
use di_abstractions::{BeanFactory, BeanFactoryExt, BeanInstance, DefinitionRegistry};
use di_impl::DefaultBeanFactory;
use infrastructure_common::{
    BeanResult, ContainerConfig, InfrastructureError, InfrastructureResult, Lifecycle, TypeKey,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 应用上下文
///
/// 持有 Bean 工厂，负责刷新、`Lifecycle` Bean 的启停与关闭时的单例销毁
pub struct ApplicationContext {
    id: Uuid,
    factory: Arc<DefaultBeanFactory>,
    status: RwLock<ContextStatus>,
    startup_date: RwLock<Option<DateTime<Utc>>>,
    close_date: RwLock<Option<DateTime<Utc>>>,
    /// 按启动顺序记录已启动的 Bean
    started: Mutex<Vec<(String, Arc<dyn Lifecycle>)>>,
    closed: AtomicBool,
}

impl ApplicationContext {
    /// 创建应用上下文构建器
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    pub(crate) fn new(factory: Arc<DefaultBeanFactory>) -> Self {
        Self {
            id: Uuid::new_v4(),
            factory,
            status: RwLock::new(ContextStatus::Created),
            startup_date: RwLock::new(None),
            close_date: RwLock::new(None),
            started: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// 上下文标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 刷新完成的时间
    pub fn startup_date(&self) -> Option<DateTime<Utc>> {
        *self.startup_date.read()
    }

    /// 底层 Bean 工厂
    pub fn factory(&self) -> &Arc<DefaultBeanFactory> {
        &self.factory
    }

    /// 生效的容器配置
    pub fn config(&self) -> &ContainerConfig {
        self.factory.config()
    }

    /// 当前状态
    pub fn status(&self) -> ContextStatus {
        *self.status.read()
    }

    fn set_status(&self, status: ContextStatus) {
        *self.status.write() = status;
    }

    /// 刷新上下文：预实例化全部非延迟单例
    ///
    /// 失败时销毁已经创建的单例，上下文进入 `Failed` 状态
    pub fn refresh(&self) -> InfrastructureResult<()> {
        {
            let mut status = self.status.write();
            if *status != ContextStatus::Created {
                return Err(InfrastructureError::BootstrapFailed {
                    message: format!("上下文 {} 不能在 {:?} 状态下刷新", self.id, *status),
                });
            }
            *status = ContextStatus::Refreshing;
        }
        info!("刷新应用上下文: {}", self.id);

        if self.factory.config().pre_instantiate_singletons {
            if let Err(e) = self.factory.pre_instantiate_singletons() {
                error!("应用上下文刷新失败: {}", e);
                self.factory.destroy_singletons();
                self.set_status(ContextStatus::Failed);
                return Err(e.into());
            }
        }

        *self.startup_date.write() = Some(Utc::now());
        self.set_status(ContextStatus::Active);
        info!(
            "应用上下文刷新完成, 单例数量: {}",
            self.factory.registry().singleton_count()
        );
        Ok(())
    }

    /// 按名称获取 Bean
    pub fn get_bean(&self, name: &str) -> BeanResult<BeanInstance> {
        self.factory.get_bean(name)
    }

    /// 按名称获取并向下转型为具体类型
    pub fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> BeanResult<Arc<T>> {
        self.factory.get_typed::<T>(name)
    }

    /// 按名称获取 trait 视图
    pub fn get_as<U: ?Sized + 'static>(&self, name: &str) -> BeanResult<Arc<U>> {
        self.factory.get_as::<U>(name)
    }

    /// 按类型获取唯一 Bean
    pub fn get_of_type<U: ?Sized + 'static>(&self) -> BeanResult<Arc<U>> {
        self.factory.get_of_type::<U>()
    }

    /// 是否存在该名称的定义或单例
    pub fn contains_bean(&self, name: &str) -> bool {
        self.factory.contains_bean(name)
    }

    /// 启动全部单例 `Lifecycle` Bean
    ///
    /// 按阶段升序启动，阶段相同时按注册顺序；已经在运行的 Bean 只记录不重复启动
    pub async fn start(&self) -> InfrastructureResult<()> {
        let status = self.status();
        if status != ContextStatus::Active {
            return Err(InfrastructureError::BootstrapFailed {
                message: format!("上下文在 {:?} 状态下不能启动", status),
            });
        }
        self.set_status(ContextStatus::Starting);

        let mut beans = self.lifecycle_beans()?;
        beans.sort_by_key(|(_, bean)| bean.phase());

        for (name, bean) in beans {
            if !bean.is_running() {
                debug!("启动 Bean '{}' (phase = {})", name, bean.phase());
                if let Err(source) = bean.on_start().await {
                    error!("Bean '{}' 启动失败: {}", name, source);
                    self.set_status(ContextStatus::Active);
                    return Err(InfrastructureError::LifecycleFailed { bean_name: name, source });
                }
            }
            self.started.lock().push((name, bean));
        }

        self.set_status(ContextStatus::Running);
        info!("应用上下文已启动: {}", self.id);
        Ok(())
    }

    fn lifecycle_beans(&self) -> InfrastructureResult<Vec<(String, Arc<dyn Lifecycle>)>> {
        let mut beans = Vec::new();
        for name in self
            .factory
            .bean_names_for_type(TypeKey::of::<dyn Lifecycle>(), false, false)
        {
            let bean = self.factory.get_bean(&name)?;
            if let Some(lifecycle) = bean.cast::<dyn Lifecycle>() {
                beans.push((name, lifecycle));
            }
        }
        Ok(beans)
    }

    /// 按启动的逆序停止 `Lifecycle` Bean
    ///
    /// 单个 Bean 停止失败不影响其余 Bean，全部停止后汇总返回
    pub async fn stop(&self) -> InfrastructureResult<()> {
        let started: Vec<_> = std::mem::take(&mut *self.started.lock());
        if started.is_empty() {
            if self.status() == ContextStatus::Running {
                self.set_status(ContextStatus::Active);
            }
            return Ok(());
        }
        self.set_status(ContextStatus::Stopping);

        let mut failures = Vec::new();
        for (name, bean) in started.into_iter().rev() {
            if !bean.is_running() {
                continue;
            }
            debug!("停止 Bean '{}'", name);
            if let Err(e) = bean.on_stop().await {
                warn!("Bean '{}' 停止失败: {}", name, e);
                failures.push(format!("{}: {}", name, e));
            }
        }

        self.set_status(ContextStatus::Active);
        info!("应用上下文已停止: {}", self.id);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(InfrastructureError::ShutdownFailed {
                message: failures.join("; "),
            })
        }
    }

    /// 关闭上下文：停止 `Lifecycle` Bean 并销毁全部单例
    ///
    /// 重复调用不产生效果
    pub async fn close(&self) -> InfrastructureResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("应用上下文 {} 已经关闭", self.id);
            return Ok(());
        }
        info!("关闭应用上下文: {}", self.id);

        let stopped = self.stop().await;
        self.set_status(ContextStatus::Closing);
        self.factory.destroy_singletons();
        *self.close_date.write() = Some(Utc::now());
        self.set_status(ContextStatus::Closed);

        info!("应用上下文已关闭: {}", self.id);
        stopped
    }

    /// 是否已经关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 等待 Ctrl-C 后关闭上下文
    pub async fn wait_for_shutdown_signal(&self) -> InfrastructureResult<()> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| InfrastructureError::ShutdownFailed {
                message: format!("监听关闭信号失败: {}", e),
            })?;
        info!("收到关闭信号");
        self.close().await
    }

    /// 统计信息
    pub fn stats(&self) -> ContextStats {
        ContextStats {
            id: self.id,
            startup_date: self.startup_date(),
            close_date: *self.close_date.read(),
            definition_count: self.factory.definition_count(),
            singleton_count: self.factory.registry().singleton_count(),
            post_processor_count: self.factory.post_processors().len(),
            running_lifecycle_beans: self.started.lock().len(),
        }
    }
}

/// 应用上下文状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextStatus {
    /// 已构建，尚未刷新
    Created,
    /// 刷新中
    Refreshing,
    /// 刷新完成
    Active,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 关闭中
    Closing,
    /// 已关闭
    Closed,
    /// 刷新失败
    Failed,
}

/// 应用上下文统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStats {
    pub id: Uuid,
    /// 刷新完成时间
    pub startup_date: Option<DateTime<Utc>>,
    /// 关闭时间
    pub close_date: Option<DateTime<Utc>>,
    /// Bean 定义数量
    pub definition_count: usize,
    /// 已创建的单例数量
    pub singleton_count: usize,
    /// 后处理器数量
    pub post_processor_count: usize,
    /// 已启动的 `Lifecycle` Bean 数量
    pub running_lifecycle_beans: usize,
}

impl ContextStats {
    /// 运行时间
    pub fn uptime(&self) -> Option<chrono::Duration> {
        match (self.startup_date, self.close_date) {
            (Some(start), Some(stop)) => Some(stop - start),
            (Some(start), None) => Some(Utc::now() - start),
            _ => None,
        }
    }
}
