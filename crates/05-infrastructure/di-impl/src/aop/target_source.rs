//! 目标源

use di_abstractions::{BeanDefinition, BeanFactory, BeanInstance, ComponentModel, TargetSource, TargetSourceCreator};
use infrastructure_common::{BeanError, BeanResult};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// 延迟目标 Bean 定义的名称后缀，带有该后缀的 Bean 不会被自动代理
pub const ORIGINAL_SUFFIX: &str = ".ORIGINAL";

fn upgrade(factory: &Weak<dyn BeanFactory>, bean_name: &str) -> BeanResult<Arc<dyn BeanFactory>> {
    factory.upgrade().ok_or_else(|| BeanError::CreationNotAllowed {
        bean_name: bean_name.to_string(),
    })
}

/// 固定目标
pub struct SingletonTargetSource {
    target: BeanInstance,
}

impl SingletonTargetSource {
    pub fn new(target: BeanInstance) -> Self {
        Self { target }
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_model(&self) -> Arc<dyn ComponentModel> {
        self.target.model().clone()
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> BeanResult<BeanInstance> {
        Ok(self.target.clone())
    }
}

/// 每次调用获取一个新的原型目标，调用后销毁
pub struct PrototypeTargetSource {
    factory: Weak<dyn BeanFactory>,
    bean_name: String,
    model: Arc<dyn ComponentModel>,
}

impl PrototypeTargetSource {
    pub fn new(factory: Weak<dyn BeanFactory>, bean_name: impl Into<String>, model: Arc<dyn ComponentModel>) -> Self {
        Self {
            factory,
            bean_name: bean_name.into(),
            model,
        }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_model(&self) -> Arc<dyn ComponentModel> {
        self.model.clone()
    }

    fn get_target(&self) -> BeanResult<BeanInstance> {
        upgrade(&self.factory, &self.bean_name)?.get_bean(&self.bean_name)
    }

    fn release_target(&self, target: &BeanInstance) {
        if let Some(factory) = self.factory.upgrade() {
            factory.destroy_bean(&self.bean_name, target);
        }
    }
}

/// 首次调用时才创建目标
pub struct LazyInitTargetSource {
    factory: Weak<dyn BeanFactory>,
    bean_name: String,
    model: Arc<dyn ComponentModel>,
    target: Mutex<Option<BeanInstance>>,
}

impl LazyInitTargetSource {
    pub fn new(factory: Weak<dyn BeanFactory>, bean_name: impl Into<String>, model: Arc<dyn ComponentModel>) -> Self {
        Self {
            factory,
            bean_name: bean_name.into(),
            model,
            target: Mutex::new(None),
        }
    }

    /// 目标是否已经创建
    pub fn is_initialized(&self) -> bool {
        self.target.lock().is_some()
    }
}

impl TargetSource for LazyInitTargetSource {
    fn target_model(&self) -> Arc<dyn ComponentModel> {
        self.model.clone()
    }

    fn get_target(&self) -> BeanResult<BeanInstance> {
        if let Some(target) = self.target.lock().as_ref() {
            return Ok(target.clone());
        }
        debug!("延迟初始化目标 Bean: {}", self.bean_name);
        let created = upgrade(&self.factory, &self.bean_name)?.get_bean(&self.bean_name)?;
        Ok(self.target.lock().get_or_insert(created).clone())
    }
}

/// 为延迟初始化的 Bean 创建 [`LazyInitTargetSource`]
///
/// 原定义以 `名称.ORIGINAL` 另行注册，不参与自动装配，由目标源在首次调用时获取。
pub struct LazyInitTargetSourceCreator;

impl TargetSourceCreator for LazyInitTargetSourceCreator {
    fn target_source(
        &self,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
        factory: &Arc<dyn BeanFactory>,
    ) -> BeanResult<Option<Arc<dyn TargetSource>>> {
        if bean_name.ends_with(ORIGINAL_SUFFIX) || !factory.contains_definition(bean_name) {
            return Ok(None);
        }
        let merged = factory.merged_definition(bean_name)?;
        if !merged.is_lazy() || !merged.is_singleton() {
            return Ok(None);
        }

        let original_name = format!("{}{}", bean_name, ORIGINAL_SUFFIX);
        if !factory.contains_definition(&original_name) {
            let original: BeanDefinition = (*merged)
                .clone()
                .with_autowire_candidate(false)
                .with_lazy_init(true);
            factory.register_definition(&original_name, original)?;
            trace!("为 '{}' 注册延迟目标定义 '{}'", bean_name, original_name);
        }
        Ok(Some(Arc::new(LazyInitTargetSource::new(
            Arc::downgrade(factory),
            original_name,
            model.clone(),
        ))))
    }
}
