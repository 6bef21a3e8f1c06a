//! 销毁回调适配器

use crate::post_processors::PostProcessorChain;
use di_abstractions::{Args, BeanDefinition, BeanInstance, BeanPostProcessor};
use infrastructure_common::{BoxError, DisposableBean};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_DESTROY_METHOD: &str = "destroy";

/// 把一个 Bean 的全部销毁逻辑合并为一个 [`DisposableBean`]
///
/// 顺序：销毁感知后处理器、`DisposableBean::destroy`、配置的销毁方法。
/// 后处理器的错误直接返回，后两者的错误只记录日志。
pub struct DisposableBeanAdapter {
    bean_name: String,
    bean: BeanInstance,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
    invoke_disposable: bool,
    destroy_method: Option<String>,
}

impl DisposableBeanAdapter {
    /// 为 Bean 创建适配器
    pub fn new(
        bean_name: &str,
        bean: BeanInstance,
        definition: &BeanDefinition,
        post_processors: &PostProcessorChain,
    ) -> Self {
        let invoke_disposable = bean.cast::<dyn DisposableBean>().is_some();
        let destroy_method = definition
            .destroy_method
            .clone()
            .filter(|method| !(invoke_disposable && method == DEFAULT_DESTROY_METHOD));
        let processors = post_processors.destruction_aware_for(&bean);
        Self {
            bean_name: bean_name.to_string(),
            bean,
            processors,
            invoke_disposable,
            destroy_method,
        }
    }

    /// Bean 是否需要销毁回调
    pub fn requires_destruction(
        bean: &BeanInstance,
        definition: &BeanDefinition,
        post_processors: &PostProcessorChain,
    ) -> bool {
        bean.cast::<dyn DisposableBean>().is_some()
            || definition.destroy_method.is_some()
            || !post_processors.destruction_aware_for(bean).is_empty()
    }
}

impl DisposableBean for DisposableBeanAdapter {
    fn destroy(&self) -> Result<(), BoxError> {
        for processor in &self.processors {
            if let Some(aware) = processor.as_destruction_aware() {
                aware.before_destruction(&self.bean, &self.bean_name)?;
            }
        }

        if self.invoke_disposable {
            debug!("调用 Bean '{}' 的 destroy()", self.bean_name);
            if let Some(disposable) = self.bean.cast::<dyn DisposableBean>() {
                if let Err(err) = disposable.destroy() {
                    warn!("Bean '{}' 的 destroy() 失败: {}", self.bean_name, err);
                }
            }
        }

        if let Some(method) = &self.destroy_method {
            debug!("调用 Bean '{}' 的销毁方法 '{}'", self.bean_name, method);
            if let Err(err) = self.bean.invoke(method, Args::empty()) {
                warn!("Bean '{}' 的销毁方法 '{}' 失败: {}", self.bean_name, method, err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_model::BeanClass;
    use di_abstractions::DynValue;
    use parking_lot::Mutex;

    struct Pool {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl DisposableBean for Pool {
        fn destroy(&self) -> Result<(), BoxError> {
            self.log.lock().push("destroy");
            Ok(())
        }
    }

    fn pool(log: Arc<Mutex<Vec<&'static str>>>) -> BeanInstance {
        let model = BeanClass::<Pool>::builder()
            .disposable()
            .method("destroy", |pool, _| {
                pool.log.lock().push("method:destroy");
                Ok(DynValue::Null)
            })
            .method("close", |pool, _| {
                pool.log.lock().push("method:close");
                Err("连接已断开".into())
            })
            .build();
        BeanInstance::of(Pool { log }, model)
    }

    #[test]
    fn test_destroy_method_with_same_name_runs_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bean = pool(log.clone());
        let definition = BeanDefinition::default().with_destroy_method("destroy");
        let chain = PostProcessorChain::new();

        assert!(DisposableBeanAdapter::requires_destruction(&bean, &definition, &chain));
        DisposableBeanAdapter::new("pool", bean, &definition, &chain)
            .destroy()
            .unwrap();
        assert_eq!(*log.lock(), vec!["destroy"]);
    }

    #[test]
    fn test_failing_destroy_method_is_swallowed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = BeanDefinition::default().with_destroy_method("close");
        let adapter =
            DisposableBeanAdapter::new("pool", pool(log.clone()), &definition, &PostProcessorChain::new());

        assert!(adapter.destroy().is_ok());
        assert_eq!(*log.lock(), vec!["destroy", "method:close"]);
    }
}
