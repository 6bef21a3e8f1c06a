//! 单例注册表
//!
//! 单例实例在任一时刻只处于三种状态之一：已完成、已登记早期引用工厂、
//! 已缓存早期引用。三张状态表只在持有注册表的可重入锁时修改；
//! 已完成表使用 [`DashMap`]，稳定后读取不需要加锁。
//!
//! 依赖关系表与销毁登记各自使用独立的锁，不与单例创建互相阻塞。

use dashmap::{DashMap, DashSet};
use di_abstractions::BeanInstance;
use infrastructure_common::{BeanError, BeanResult, DisposableBean};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// 早期引用工厂
pub type SingletonFactory = Box<dyn FnOnce() -> BeanResult<BeanInstance> + Send>;

/// 每次创建最多保留的被抑制错误数量
const SUPPRESSED_ERRORS_LIMIT: usize = 100;

#[derive(Default)]
struct SingletonState {
    singleton_factories: HashMap<String, SingletonFactory>,
    early_singletons: HashMap<String, BeanInstance>,
    registered: Vec<String>,
    suppressed_errors: Option<Vec<BeanError>>,
    in_destruction: bool,
}

/// 单例注册表
#[derive(Default)]
pub struct SingletonRegistry {
    singletons: DashMap<String, BeanInstance>,
    state: ReentrantMutex<RefCell<SingletonState>>,
    in_creation: DashSet<String>,
    creation_exclusions: DashSet<String>,
    dependents: Mutex<HashMap<String, Vec<String>>>,
    dependencies: Mutex<HashMap<String, Vec<String>>>,
    contained: Mutex<HashMap<String, Vec<String>>>,
    disposables: Mutex<Vec<(String, Box<dyn DisposableBean>)>>,
}

/// 创建标记守卫，离开作用域时清除"正在创建"标记
struct CreationMark<'a> {
    registry: &'a SingletonRegistry,
    name: &'a str,
}

impl Drop for CreationMark<'_> {
    fn drop(&mut self) {
        self.registry.in_creation.remove(self.name);
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) -> bool {
    if values.iter().any(|existing| existing == value) {
        return false;
    }
    values.push(value.to_string());
    true
}

impl SingletonRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册已经完成的单例
    pub fn register_singleton(&self, name: &str, instance: BeanInstance) -> BeanResult<()> {
        let guard = self.state.lock();
        if self.singletons.contains_key(name) {
            return Err(BeanError::AlreadyRegistered {
                bean_name: name.to_string(),
            });
        }
        let mut state = guard.borrow_mut();
        self.store_singleton(&mut state, name, instance);
        Ok(())
    }

    fn store_singleton(&self, state: &mut SingletonState, name: &str, instance: BeanInstance) {
        self.singletons.insert(name.to_string(), instance);
        state.singleton_factories.remove(name);
        state.early_singletons.remove(name);
        push_unique(&mut state.registered, name);
    }

    /// 登记早期引用工厂，名称已完成时忽略
    pub fn add_singleton_factory(&self, name: &str, factory: SingletonFactory) {
        let guard = self.state.lock();
        if self.singletons.contains_key(name) {
            return;
        }
        let mut state = guard.borrow_mut();
        state.singleton_factories.insert(name.to_string(), factory);
        state.early_singletons.remove(name);
        push_unique(&mut state.registered, name);
    }

    /// 获取单例；名称正在创建且允许早期引用时返回早期引用
    pub fn get_singleton(&self, name: &str, allow_early_reference: bool) -> BeanResult<Option<BeanInstance>> {
        if let Some(instance) = self.completed(name) {
            return Ok(Some(instance));
        }
        if !self.is_currently_in_creation(name) {
            return Ok(None);
        }

        let guard = self.state.lock();
        if let Some(instance) = self.completed(name) {
            return Ok(Some(instance));
        }
        let early = guard.borrow().early_singletons.get(name).cloned();
        if early.is_some() || !allow_early_reference {
            return Ok(early);
        }
        let factory = guard.borrow_mut().singleton_factories.remove(name);
        let Some(factory) = factory else {
            return Ok(None);
        };

        trace!("调用早期引用工厂: {}", name);
        let early = factory()?;
        guard
            .borrow_mut()
            .early_singletons
            .insert(name.to_string(), early.clone());
        Ok(Some(early))
    }

    fn completed(&self, name: &str) -> Option<BeanInstance> {
        self.singletons.get(name).map(|entry| entry.value().clone())
    }

    /// 获取或创建单例
    ///
    /// 整个创建过程持有注册表锁：同名单例不会被并发创建，第二个调用方
    /// 等待第一个完成后直接拿到缓存结果。
    pub fn get_singleton_or_create<F>(&self, name: &str, create: F) -> BeanResult<BeanInstance>
    where
        F: FnOnce() -> BeanResult<BeanInstance>,
    {
        let guard = self.state.lock();
        if let Some(instance) = self.completed(name) {
            return Ok(instance);
        }
        if guard.borrow().in_destruction {
            return Err(BeanError::CreationNotAllowed {
                bean_name: name.to_string(),
            });
        }

        debug!("创建单例 Bean: {}", name);
        let mark = self.before_singleton_creation(name)?;
        let record_suppressed = {
            let mut state = guard.borrow_mut();
            if state.suppressed_errors.is_none() {
                state.suppressed_errors = Some(Vec::new());
                true
            } else {
                false
            }
        };

        let result = create();

        let suppressed = if record_suppressed {
            guard.borrow_mut().suppressed_errors.take().unwrap_or_default()
        } else {
            Vec::new()
        };
        drop(mark);

        match result {
            Ok(instance) => {
                let mut state = guard.borrow_mut();
                self.store_singleton(&mut state, name, instance.clone());
                Ok(instance)
            }
            Err(mut err) => {
                for cause in suppressed {
                    err.add_related_cause(cause);
                }
                Err(err)
            }
        }
    }

    fn before_singleton_creation<'a>(&'a self, name: &'a str) -> BeanResult<Option<CreationMark<'a>>> {
        if self.creation_exclusions.contains(name) {
            return Ok(None);
        }
        if !self.in_creation.insert(name.to_string()) {
            return Err(BeanError::currently_in_creation(name));
        }
        Ok(Some(CreationMark { registry: self, name }))
    }

    /// 记录创建过程中被抑制的错误
    pub fn on_suppressed_error(&self, error: BeanError) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if let Some(errors) = state.suppressed_errors.as_mut() {
            if errors.len() < SUPPRESSED_ERRORS_LIMIT {
                errors.push(error);
            }
        }
    }

    /// 持有注册表锁执行
    pub fn synchronized<R>(&self, action: impl FnOnce() -> R) -> R {
        let _guard = self.state.lock();
        action()
    }

    /// 移除单例的全部状态
    pub fn remove_singleton(&self, name: &str) {
        let guard = self.state.lock();
        self.singletons.remove(name);
        let mut state = guard.borrow_mut();
        state.singleton_factories.remove(name);
        state.early_singletons.remove(name);
        state.registered.retain(|existing| existing != name);
    }

    /// 是否存在已完成的单例
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains_key(name)
    }

    /// 已登记的单例名称，按登记顺序
    pub fn singleton_names(&self) -> Vec<String> {
        let guard = self.state.lock();
        let names = guard.borrow().registered.clone();
        names
    }

    /// 已登记的单例数量
    pub fn singleton_count(&self) -> usize {
        let guard = self.state.lock();
        let count = guard.borrow().registered.len();
        count
    }

    /// 设置名称是否参与"正在创建"检查
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        if in_creation {
            self.creation_exclusions.remove(name);
        } else {
            self.creation_exclusions.insert(name.to_string());
        }
    }

    /// 单例是否正在创建
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }

    /// 登记依赖关系：`dependent` 依赖 `name`
    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        {
            let mut dependents = self.dependents.lock();
            let entry = dependents.entry(name.to_string()).or_default();
            if !push_unique(entry, dependent) {
                return;
            }
        }
        let mut dependencies = self.dependencies.lock();
        push_unique(dependencies.entry(dependent.to_string()).or_default(), name);
    }

    /// 登记内部 Bean：销毁外部 Bean 时一并销毁
    pub fn register_contained_bean(&self, contained: &str, containing: &str) {
        {
            let mut map = self.contained.lock();
            if !push_unique(map.entry(containing.to_string()).or_default(), contained) {
                return;
            }
        }
        self.register_dependent_bean(contained, containing);
    }

    /// `dependent` 是否直接或间接依赖 `name`
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let dependents = self.dependents.lock();
        let mut visited = HashSet::new();
        Self::is_dependent_in(&dependents, name, dependent, &mut visited)
    }

    fn is_dependent_in(
        dependents: &HashMap<String, Vec<String>>,
        name: &str,
        dependent: &str,
        visited: &mut HashSet<String>,
    ) -> bool {
        if !visited.insert(name.to_string()) {
            return false;
        }
        let Some(direct) = dependents.get(name) else {
            return false;
        };
        if direct.iter().any(|existing| existing == dependent) {
            return true;
        }
        direct
            .iter()
            .any(|transitive| Self::is_dependent_in(dependents, transitive, dependent, visited))
    }

    /// 是否有其他 Bean 依赖它
    pub fn has_dependent_bean(&self, name: &str) -> bool {
        self.dependents
            .lock()
            .get(name)
            .map_or(false, |dependents| !dependents.is_empty())
    }

    /// 依赖它的 Bean
    pub fn dependent_beans(&self, name: &str) -> Vec<String> {
        self.dependents.lock().get(name).cloned().unwrap_or_default()
    }

    /// 它依赖的 Bean
    pub fn dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.dependencies.lock().get(name).cloned().unwrap_or_default()
    }

    /// 登记销毁回调
    pub fn register_disposable_bean(&self, name: &str, bean: Box<dyn DisposableBean>) {
        let mut disposables = self.disposables.lock();
        disposables.retain(|(existing, _)| existing != name);
        disposables.push((name.to_string(), bean));
    }

    /// 是否登记了销毁回调
    pub fn has_disposable_bean(&self, name: &str) -> bool {
        self.disposables.lock().iter().any(|(existing, _)| existing == name)
    }

    /// 按登记的逆序销毁全部单例
    pub fn destroy_singletons(&self) {
        debug!("销毁全部单例, 数量: {}", self.singleton_count());
        {
            let guard = self.state.lock();
            guard.borrow_mut().in_destruction = true;
        }

        let names: Vec<String> = self
            .disposables
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.contained.lock().clear();
        self.dependents.lock().clear();
        self.dependencies.lock().clear();

        let guard = self.state.lock();
        self.singletons.clear();
        let mut state = guard.borrow_mut();
        state.singleton_factories.clear();
        state.early_singletons.clear();
        state.registered.clear();
        state.in_destruction = false;
    }

    /// 销毁单个单例：先销毁依赖它的 Bean，再销毁它自己与它包含的内部 Bean
    pub fn destroy_singleton(&self, name: &str) {
        self.remove_singleton(name);
        let disposable = {
            let mut disposables = self.disposables.lock();
            disposables
                .iter()
                .position(|(existing, _)| existing == name)
                .map(|index| disposables.remove(index).1)
        };
        self.destroy_bean(name, disposable);
    }

    fn destroy_bean(&self, name: &str, disposable: Option<Box<dyn DisposableBean>>) {
        let dependents = self.dependents.lock().remove(name);
        if let Some(dependents) = dependents {
            trace!("先销毁依赖 '{}' 的 Bean: {:?}", name, dependents);
            for dependent in &dependents {
                self.destroy_singleton(dependent);
            }
        }

        if let Some(bean) = disposable {
            trace!("调用 Bean '{}' 的销毁回调", name);
            if let Err(err) = bean.destroy() {
                warn!("销毁 Bean '{}' 失败: {}", name, err);
            }
        }

        let contained = self.contained.lock().remove(name);
        for inner in contained.into_iter().flatten() {
            self.destroy_singleton(&inner);
        }

        {
            let mut dependents = self.dependents.lock();
            for values in dependents.values_mut() {
                values.retain(|existing| existing != name);
            }
            dependents.retain(|_, values| !values.is_empty());
        }
        self.dependencies.lock().remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_model::BeanClass;
    use infrastructure_common::BoxError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Widget;

    fn widget() -> BeanInstance {
        let model = BeanClass::<Widget>::builder()
            .default_constructor(|| Widget)
            .build();
        BeanInstance::of(Widget, model)
    }

    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl DisposableBean for Recorder {
        fn destroy(&self) -> Result<(), BoxError> {
            self.log.lock().push(self.name.clone());
            if self.fail {
                return Err("销毁失败".into());
            }
            Ok(())
        }
    }

    fn recorder(name: &str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Box<dyn DisposableBean> {
        Box::new(Recorder {
            name: name.to_string(),
            log: log.clone(),
            fail,
        })
    }

    #[test]
    fn test_register_twice_keeps_original() {
        let registry = SingletonRegistry::new();
        let first = widget();
        registry.register_singleton("widget", first.clone()).unwrap();

        let err = registry.register_singleton("widget", widget()).unwrap_err();
        assert!(matches!(err, BeanError::AlreadyRegistered { .. }));

        let current = registry.get_singleton("widget", true).unwrap().unwrap();
        assert!(current.same_instance(&first));
        assert_eq!(registry.singleton_names(), vec!["widget".to_string()]);
    }

    #[test]
    fn test_early_factory_runs_once_while_in_creation() {
        let registry = SingletonRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = registry.get_singleton_or_create("a", || {
            let counter = calls.clone();
            let raw = widget();
            let exposed = raw.clone();
            registry.add_singleton_factory(
                "a",
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(exposed)
                }),
            );

            let first = registry.get_singleton("a", true)?.expect("早期引用");
            let second = registry.get_singleton("a", true)?.expect("早期引用");
            assert!(first.same_instance(&second));
            assert!(registry.get_singleton("a", false)?.is_some());
            Ok(raw)
        });

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.is_currently_in_creation("a"));
        assert!(registry.contains_singleton("a"));
    }

    #[test]
    fn test_not_in_creation_never_uses_factory() {
        let registry = SingletonRegistry::new();
        registry.add_singleton_factory("a", Box::new(|| Ok(widget())));
        assert!(registry.get_singleton("a", true).unwrap().is_none());
    }

    #[test]
    fn test_reentrant_creation_is_rejected_and_mark_cleared() {
        let registry = SingletonRegistry::new();
        let err = registry
            .get_singleton_or_create("a", || registry.get_singleton_or_create("a", || Ok(widget())))
            .unwrap_err();
        assert!(matches!(err, BeanError::CurrentlyInCreation { .. }));
        assert!(!registry.is_currently_in_creation("a"));

        let created = registry.get_singleton_or_create("a", || Ok(widget()));
        assert!(created.is_ok());
    }

    #[test]
    fn test_suppressed_errors_attached_to_failure() {
        let registry = SingletonRegistry::new();
        let err = registry
            .get_singleton_or_create("a", || {
                registry.on_suppressed_error(BeanError::no_such_bean("b"));
                Err(BeanError::creation(
                    "a",
                    infrastructure_common::CreationPhase::Instantiation,
                    "失败",
                ))
            })
            .unwrap_err();
        assert_eq!(err.related_causes().len(), 1);
    }

    #[test]
    fn test_concurrent_creation_yields_one_instance() {
        let registry = SingletonRegistry::new();
        let created = AtomicUsize::new(0);

        let instances: Vec<BeanInstance> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        registry
                            .get_singleton_or_create("shared", || {
                                created.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(std::time::Duration::from_millis(10));
                                Ok(widget())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|bean| bean.same_instance(&instances[0])));
    }

    #[test]
    fn test_is_dependent_handles_cycles() {
        let registry = SingletonRegistry::new();
        registry.register_dependent_bean("a", "b");
        registry.register_dependent_bean("b", "c");
        registry.register_dependent_bean("c", "a");

        assert!(registry.is_dependent("a", "c"));
        assert!(!registry.is_dependent("a", "unknown"));
        assert_eq!(registry.dependencies_for_bean("b"), vec!["a".to_string()]);
    }

    #[test]
    fn test_destroy_dependents_first_and_survive_failures() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        // c 依赖 b，b 依赖 a
        for name in ["a", "b", "c"] {
            registry.register_singleton(name, widget()).unwrap();
        }
        registry.register_disposable_bean("c", recorder("c", &log, false));
        registry.register_disposable_bean("b", recorder("b", &log, true));
        registry.register_disposable_bean("a", recorder("a", &log, false));
        registry.register_dependent_bean("a", "b");
        registry.register_dependent_bean("b", "c");

        registry.destroy_singletons();

        assert_eq!(*log.lock(), vec!["c".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(registry.singleton_count(), 0);
        assert!(!registry.has_disposable_bean("a"));
    }

    #[test]
    fn test_contained_beans_destroyed_after_container() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register_singleton("outer", widget()).unwrap();
        registry.register_disposable_bean("outer", recorder("outer", &log, false));
        registry.register_disposable_bean("outer#inner", recorder("inner", &log, false));
        registry.register_contained_bean("outer#inner", "outer");

        registry.destroy_singleton("outer");

        assert_eq!(*log.lock(), vec!["outer".to_string(), "inner".to_string()]);
    }
}
