//! 后处理器链
//!
//! 链按显式列表保存处理器：按 `order()` 稳定排序，同序时保持注册顺序。
//! 重复注册同一个处理器会把它移到末尾再排序。每种能力的处理器列表在
//! 注册时预先计算，调用时只取快照，不在回调期间持有锁。

use di_abstractions::{
    BeanDefinition, BeanInstance, BeanPostProcessor, ComponentModel, CreationContext,
    PropertyValues,
};
use infrastructure_common::BeanResult;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Snapshot {
    all: Vec<Arc<dyn BeanPostProcessor>>,
    initialization: Vec<Arc<dyn BeanPostProcessor>>,
    instantiation: Vec<Arc<dyn BeanPostProcessor>>,
    smart_instantiation: Vec<Arc<dyn BeanPostProcessor>>,
    merged_definition: Vec<Arc<dyn BeanPostProcessor>>,
    destruction: Vec<Arc<dyn BeanPostProcessor>>,
}

impl Snapshot {
    fn build(all: Vec<Arc<dyn BeanPostProcessor>>) -> Self {
        let select = |accept: fn(&dyn BeanPostProcessor) -> bool| -> Vec<Arc<dyn BeanPostProcessor>> {
            all.iter().filter(|processor| accept(processor.as_ref())).cloned().collect()
        };
        Self {
            initialization: select(|p| p.as_initialization_aware().is_some()),
            instantiation: select(|p| p.as_instantiation_aware().is_some()),
            smart_instantiation: select(|p| p.as_smart_instantiation_aware().is_some()),
            merged_definition: select(|p| p.as_merged_definition_aware().is_some()),
            destruction: select(|p| p.as_destruction_aware().is_some()),
            all,
        }
    }
}

fn same_processor(a: &Arc<dyn BeanPostProcessor>, b: &Arc<dyn BeanPostProcessor>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// 后处理器链
#[derive(Default)]
pub struct PostProcessorChain {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl PostProcessorChain {
    /// 创建空链
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// 添加处理器
    pub fn add(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut guard = self.snapshot.write();
        let mut all: Vec<Arc<dyn BeanPostProcessor>> = guard
            .all
            .iter()
            .filter(|existing| !same_processor(existing, &processor))
            .cloned()
            .collect();
        debug!("添加后处理器: {} (order = {})", processor.name(), processor.order());
        all.push(processor);
        all.sort_by_key(|processor| processor.order());
        *guard = Arc::new(Snapshot::build(all));
    }

    /// 移除处理器
    pub fn remove(&self, processor: &Arc<dyn BeanPostProcessor>) -> bool {
        let mut guard = self.snapshot.write();
        let before = guard.all.len();
        let all: Vec<Arc<dyn BeanPostProcessor>> = guard
            .all
            .iter()
            .filter(|existing| !same_processor(existing, processor))
            .cloned()
            .collect();
        let removed = all.len() != before;
        *guard = Arc::new(Snapshot::build(all));
        removed
    }

    /// 处理器数量
    pub fn len(&self) -> usize {
        self.snapshot().all.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按调用顺序排列的处理器名称
    pub fn names(&self) -> Vec<String> {
        self.snapshot()
            .all
            .iter()
            .map(|processor| processor.name().to_string())
            .collect()
    }

    /// 是否存在实例化感知处理器
    pub fn has_instantiation_aware(&self) -> bool {
        !self.snapshot().instantiation.is_empty()
    }

    /// 实例化前短路：第一个非空结果生效
    pub fn apply_before_instantiation(
        &self,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<BeanInstance>> {
        for processor in &self.snapshot().instantiation {
            let Some(aware) = processor.as_instantiation_aware() else {
                continue;
            };
            if let Some(bean) = aware.before_instantiation(model, bean_name)? {
                trace!("后处理器 {} 在实例化前提供了 Bean '{}'", processor.name(), bean_name);
                return Ok(Some(bean));
            }
        }
        Ok(None)
    }

    /// 候选构造器：第一个非空结果生效
    pub fn determine_candidate_constructors(
        &self,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<Option<Vec<usize>>> {
        for processor in &self.snapshot().smart_instantiation {
            let Some(aware) = processor.as_smart_instantiation_aware() else {
                continue;
            };
            if let Some(candidates) = aware.determine_candidate_constructors(model, bean_name)? {
                return Ok(Some(candidates));
            }
        }
        Ok(None)
    }

    /// 预测最终类型
    pub fn predict_bean_type(
        &self,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> Option<Arc<dyn ComponentModel>> {
        self.snapshot().smart_instantiation.iter().find_map(|processor| {
            processor
                .as_smart_instantiation_aware()
                .and_then(|aware| aware.predict_bean_type(model, bean_name))
        })
    }

    /// 早期引用：依次传递
    pub fn early_bean_reference(&self, bean: BeanInstance, bean_name: &str) -> BeanResult<BeanInstance> {
        let mut exposed = bean;
        for processor in &self.snapshot().smart_instantiation {
            if let Some(aware) = processor.as_smart_instantiation_aware() {
                exposed = aware.early_bean_reference(exposed, bean_name)?;
            }
        }
        Ok(exposed)
    }

    /// 实例化之后：任一处理器返回 `false` 即跳过属性填充
    pub fn apply_after_instantiation(&self, bean: &BeanInstance, bean_name: &str) -> BeanResult<bool> {
        for processor in &self.snapshot().instantiation {
            if let Some(aware) = processor.as_instantiation_aware() {
                if !aware.after_instantiation(bean, bean_name)? {
                    trace!("后处理器 {} 跳过了 Bean '{}' 的属性填充", processor.name(), bean_name);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// 属性值处理：每个处理器接收上一个的结果
    pub fn apply_process_properties(
        &self,
        property_values: PropertyValues,
        bean: &BeanInstance,
        bean_name: &str,
        ctx: &mut CreationContext,
    ) -> BeanResult<PropertyValues> {
        let mut current = property_values;
        for processor in &self.snapshot().instantiation {
            if let Some(aware) = processor.as_instantiation_aware() {
                if let Some(replaced) = aware.process_properties(&current, bean, bean_name, ctx)? {
                    current = replaced;
                }
            }
        }
        Ok(current)
    }

    /// 合并定义后处理
    pub fn apply_merged_definition(
        &self,
        definition: &BeanDefinition,
        model: &Arc<dyn ComponentModel>,
        bean_name: &str,
    ) -> BeanResult<()> {
        for processor in &self.snapshot().merged_definition {
            if let Some(aware) = processor.as_merged_definition_aware() {
                aware.post_process_merged_definition(definition, model, bean_name)?;
            }
        }
        Ok(())
    }

    /// 通知处理器定义已被重置
    pub fn reset_bean_definition(&self, bean_name: &str) {
        for processor in &self.snapshot().merged_definition {
            if let Some(aware) = processor.as_merged_definition_aware() {
                aware.reset_bean_definition(bean_name);
            }
        }
    }

    /// 初始化前：依次传递，返回 `None` 时停止并沿用当前结果
    pub fn apply_before_initialization(&self, bean: BeanInstance, bean_name: &str) -> BeanResult<BeanInstance> {
        let mut current = bean;
        for processor in &self.snapshot().initialization {
            let Some(aware) = processor.as_initialization_aware() else {
                continue;
            };
            match aware.before_initialization(current.clone(), bean_name)? {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Ok(current)
    }

    /// 初始化后：依次传递，返回 `None` 时停止并沿用当前结果
    pub fn apply_after_initialization(&self, bean: BeanInstance, bean_name: &str) -> BeanResult<BeanInstance> {
        let mut current = bean;
        for processor in &self.snapshot().initialization {
            let Some(aware) = processor.as_initialization_aware() else {
                continue;
            };
            match aware.after_initialization(current.clone(), bean_name)? {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Ok(current)
    }

    /// 需要在销毁前回调的处理器
    pub fn destruction_aware_for(&self, bean: &BeanInstance) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.snapshot()
            .destruction
            .iter()
            .filter(|processor| {
                processor
                    .as_destruction_aware()
                    .map_or(false, |aware| aware.requires_destruction(bean))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_model::BeanClass;
    use di_abstractions::InitializationAware;
    use infrastructure_common::HIGHEST_PRECEDENCE;

    struct Named {
        name: &'static str,
        order: i32,
        stop: bool,
        log: Arc<parking_lot::Mutex<Vec<&'static str>>>,
    }

    impl BeanPostProcessor for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn as_initialization_aware(&self) -> Option<&dyn InitializationAware> {
            Some(self)
        }
    }

    impl InitializationAware for Named {
        fn after_initialization(&self, bean: BeanInstance, _bean_name: &str) -> BeanResult<Option<BeanInstance>> {
            self.log.lock().push(self.name);
            if self.stop {
                return Ok(None);
            }
            Ok(Some(bean))
        }
    }

    struct Plain;

    fn plain() -> BeanInstance {
        BeanInstance::of(Plain, BeanClass::<Plain>::builder().build())
    }

    #[test]
    fn test_order_then_registration_and_readd_moves_to_end() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let make = |name, order| -> Arc<dyn BeanPostProcessor> {
            Arc::new(Named {
                name,
                order,
                stop: false,
                log: log.clone(),
            })
        };
        let chain = PostProcessorChain::new();
        let first = make("first", 0);
        chain.add(first.clone());
        chain.add(make("second", 0));
        chain.add(make("early", HIGHEST_PRECEDENCE));
        assert_eq!(chain.names(), vec!["early", "first", "second"]);

        chain.add(first);
        assert_eq!(chain.names(), vec!["early", "second", "first"]);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_null_result_stops_chain_and_keeps_value() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let chain = PostProcessorChain::new();
        for (name, stop) in [("a", false), ("b", true), ("c", false)] {
            chain.add(Arc::new(Named {
                name,
                order: 0,
                stop,
                log: log.clone(),
            }));
        }

        let bean = plain();
        let result = chain.apply_after_initialization(bean.clone(), "plain").unwrap();
        assert!(result.same_instance(&bean));
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }
}
