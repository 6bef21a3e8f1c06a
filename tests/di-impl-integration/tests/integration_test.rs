//! Centralized integration tests for the bean factory
use di_abstractions::{
    Autowired, BeanDefinition, BeanFactory, BeanFactoryExt, BeanInstance, BeanPostProcessor, ComponentModel,
    DefinitionRegistry, InitializationAware, InstantiationAware, ParameterInfo,
};
use di_impl::{AutowiredPostProcessor, BeanClass, DefaultBeanFactory, MapScope};
use infrastructure_common::{BeanError, BeanResult, BeanScope, BoxError, ContainerConfig, DisposableBean, TypeKey};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Slow {
    serial: usize,
}

#[test]
fn test_concurrent_requests_share_one_singleton() {
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = constructed.clone();
    let model = BeanClass::<Slow>::builder()
        .default_constructor(move || {
            thread::sleep(Duration::from_millis(20));
            Slow {
                serial: counter.fetch_add(1, Ordering::SeqCst),
            }
        })
        .build();
    factory.register_definition("slow", BeanDefinition::new(model)).unwrap();

    let beans: Vec<BeanInstance> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = factory.clone();
                scope.spawn(move || factory.get_bean("slow").unwrap())
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(beans.iter().all(|bean| bean.same_instance(&beans[0])));
    assert_eq!(factory.get_typed::<Slow>("slow").unwrap().serial, 0);
}

struct Left {
    right: Mutex<Option<Arc<Right>>>,
}

struct Right {
    left: Mutex<Option<Arc<Left>>>,
}

fn circular_factory(config: ContainerConfig) -> Arc<DefaultBeanFactory> {
    let left = BeanClass::<Left>::builder()
        .default_constructor(|| Left { right: Mutex::new(None) })
        .reference_property::<Right, _>("right", |left, value| {
            *left.right.lock() = value.downcast::<Right>();
            Ok(())
        })
        .build();
    let right = BeanClass::<Right>::builder()
        .default_constructor(|| Right { left: Mutex::new(None) })
        .reference_property::<Left, _>("left", |right, value| {
            *right.left.lock() = value.downcast::<Left>();
            Ok(())
        })
        .build();

    let factory = DefaultBeanFactory::new(config);
    factory
        .register_definition("left", BeanDefinition::new(left).with_reference("right", "right"))
        .unwrap();
    factory
        .register_definition("right", BeanDefinition::new(right).with_reference("left", "left"))
        .unwrap();
    factory
}

#[test]
fn test_circular_singletons_restore_identity() -> anyhow::Result<()> {
    let factory = circular_factory(ContainerConfig::default());
    factory.pre_instantiate_singletons()?;

    let left = factory.get_typed::<Left>("left")?;
    let right = left.right.lock().clone().expect("right 应已注入");
    let back = right.left.lock().clone().expect("left 应已注入");
    assert!(Arc::ptr_eq(&left, &back));
    assert!(Arc::ptr_eq(&right, &factory.get_typed::<Right>("right")?));
    Ok(())
}

#[test]
fn test_circular_singletons_fail_fast_when_disabled() {
    let factory = circular_factory(ContainerConfig {
        allow_circular_references: false,
        ..ContainerConfig::default()
    });

    let err = factory.pre_instantiate_singletons().unwrap_err();
    assert!(err.is_bean_creation());
    assert!(err.contains_currently_in_creation(), "{err}");
    assert_eq!(factory.registry().singleton_count(), 0);
}

struct Settings {
    name: &'static str,
}

fn settings(name: &'static str) -> BeanInstance {
    BeanInstance::of(Settings { name }, BeanClass::<Settings>::builder().build())
}

#[test]
fn test_duplicate_singleton_registration_keeps_original() {
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    factory.register_singleton("settings", settings("original")).unwrap();

    let err = factory.register_singleton("settings", settings("replacement")).unwrap_err();
    assert!(matches!(err, BeanError::AlreadyRegistered { ref bean_name } if bean_name == "settings"));
    assert_eq!(factory.get_typed::<Settings>("settings").unwrap().name, "original");
    assert_eq!(factory.registry().singleton_count(), 1);
}

struct Node {
    name: &'static str,
    fail_on_destroy: bool,
    log: Arc<Mutex<Vec<String>>>,
    next: Mutex<Option<Arc<Node>>>,
}

impl DisposableBean for Node {
    fn destroy(&self) -> Result<(), BoxError> {
        self.log.lock().push(format!("destroy:{}", self.name));
        if self.fail_on_destroy {
            return Err(format!("{} 释放失败", self.name).into());
        }
        Ok(())
    }
}

fn node_definition(name: &'static str, fail_on_destroy: bool, log: &Arc<Mutex<Vec<String>>>) -> BeanDefinition {
    let log = log.clone();
    let model = BeanClass::<Node>::builder()
        .default_constructor(move || Node {
            name,
            fail_on_destroy,
            log: log.clone(),
            next: Mutex::new(None),
        })
        .reference_property::<Node, _>("next", |node, value| {
            *node.next.lock() = value.downcast::<Node>();
            Ok(())
        })
        .disposable()
        .build();
    BeanDefinition::new(model)
}

#[test]
fn test_destruction_follows_dependencies_and_survives_failure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    factory
        .register_definition("base", node_definition("base", false, &log))
        .unwrap();
    factory
        .register_definition("middle", node_definition("middle", true, &log).with_reference("next", "base"))
        .unwrap();
    factory
        .register_definition("top", node_definition("top", false, &log).with_reference("next", "middle"))
        .unwrap();
    factory.pre_instantiate_singletons().unwrap();

    factory.destroy_singletons();

    assert_eq!(
        *log.lock(),
        vec!["destroy:top", "destroy:middle", "destroy:base"]
    );
    assert_eq!(factory.registry().singleton_count(), 0);
}

trait Store: Send + Sync {
    fn label(&self) -> &'static str;
}

struct Disk;
struct Memory;

impl Store for Disk {
    fn label(&self) -> &'static str {
        "disk"
    }
}

impl Store for Memory {
    fn label(&self) -> &'static str {
        "memory"
    }
}

fn disk() -> BeanDefinition {
    BeanDefinition::new(
        BeanClass::<Disk>::builder()
            .default_constructor(|| Disk)
            .implements::<dyn Store>(|disk| disk)
            .build(),
    )
}

fn memory() -> BeanDefinition {
    BeanDefinition::new(
        BeanClass::<Memory>::builder()
            .default_constructor(|| Memory)
            .implements::<dyn Store>(|memory| memory)
            .build(),
    )
}

#[test]
fn test_type_resolution_single_primary_and_ambiguous() {
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    factory.register_definition("disk", disk()).unwrap();
    assert_eq!(factory.get_of_type::<dyn Store>().unwrap().label(), "disk");

    factory.register_definition("memory", memory()).unwrap();
    match factory.get_of_type::<dyn Store>().err().unwrap() {
        BeanError::NoUniqueBeanDefinition { candidates, .. } => {
            assert_eq!(candidates, vec!["disk".to_string(), "memory".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    factory
        .register_definition("memory", memory().with_primary(true))
        .unwrap();
    assert_eq!(factory.get_of_type::<dyn Store>().unwrap().label(), "memory");
}

struct Widget {
    origin: &'static str,
    label: Mutex<Option<String>>,
}

fn widget_model(constructed: Arc<AtomicUsize>) -> Arc<dyn ComponentModel> {
    BeanClass::<Widget>::builder()
        .default_constructor(move || {
            constructed.fetch_add(1, Ordering::SeqCst);
            Widget {
                origin: "constructor",
                label: Mutex::new(None),
            }
        })
        .value_property("label", |widget, value| {
            *widget.label.lock() = Some(value.to::<String>()?);
            Ok(())
        })
        .build()
}

/// 为 `widget` 提供现成对象，并在初始化后替换它
struct WidgetProvider {
    seen: Mutex<Vec<String>>,
}

impl BeanPostProcessor for WidgetProvider {
    fn name(&self) -> &str {
        "widget-provider"
    }

    fn as_instantiation_aware(&self) -> Option<&dyn InstantiationAware> {
        Some(self)
    }

    fn as_initialization_aware(&self) -> Option<&dyn InitializationAware> {
        Some(self)
    }
}

impl InstantiationAware for WidgetProvider {
    fn before_instantiation(&self, model: &Arc<dyn ComponentModel>, bean_name: &str) -> BeanResult<Option<BeanInstance>> {
        if bean_name != "widget" {
            return Ok(None);
        }
        let widget = Widget {
            origin: "provider",
            label: Mutex::new(None),
        };
        Ok(Some(BeanInstance::of(widget, model.clone())))
    }
}

impl InitializationAware for WidgetProvider {
    fn after_initialization(&self, bean: BeanInstance, bean_name: &str) -> BeanResult<Option<BeanInstance>> {
        self.seen.lock().push(bean_name.to_string());
        let Some(widget) = bean.downcast::<Widget>() else {
            return Ok(Some(bean));
        };
        let transformed = Widget {
            origin: if widget.origin == "provider" { "transformed" } else { widget.origin },
            label: Mutex::new(widget.label.lock().clone()),
        };
        Ok(Some(BeanInstance::of(transformed, bean.model().clone())))
    }
}

#[test]
fn test_before_instantiation_short_circuit_still_runs_after_initialization() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(WidgetProvider {
        seen: Mutex::new(Vec::new()),
    });
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    factory.add_post_processor(provider.clone());
    factory
        .register_definition(
            "widget",
            BeanDefinition::new(widget_model(constructed.clone())).with_value("label", "blue"),
        )
        .unwrap();
    factory
        .register_definition(
            "gadget",
            BeanDefinition::new(widget_model(constructed.clone())).with_value("label", "red"),
        )
        .unwrap();

    let widget = factory.get_typed::<Widget>("widget").unwrap();
    assert_eq!(widget.origin, "transformed");
    assert_eq!(*widget.label.lock(), None);
    assert_eq!(constructed.load(Ordering::SeqCst), 0);

    let gadget = factory.get_typed::<Widget>("gadget").unwrap();
    assert_eq!(gadget.origin, "constructor");
    assert_eq!(gadget.label.lock().as_deref(), Some("red"));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert_eq!(*provider.seen.lock(), vec!["widget", "gadget"]);
}

#[test]
fn test_alias_and_depends_on() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    factory
        .register_definition("cache", node_definition("cache", false, &log))
        .unwrap();
    factory
        .register_definition("loader", node_definition("loader", false, &log).with_depends_on("cache"))
        .unwrap();
    factory.register_alias("loader", "bootLoader").unwrap();
    factory.register_alias("bootLoader", "defaultLoader").unwrap();

    let loader = factory.get_bean("defaultLoader").unwrap();
    assert!(loader.same_instance(&factory.get_bean("loader").unwrap()));
    assert!(factory.registry().contains_singleton("cache"));
    assert_eq!(factory.canonical_name("defaultLoader"), "loader");

    factory.destroy_singletons();
    assert_eq!(*log.lock(), vec!["destroy:loader", "destroy:cache"]);
}

struct Conversation {
    destroyed: Arc<AtomicUsize>,
}

impl DisposableBean for Conversation {
    fn destroy(&self) -> Result<(), BoxError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_custom_scope_reuses_until_reset() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();
    let scope = Arc::new(MapScope::new("conversation"));
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    factory.register_scope("conversation", scope.clone()).unwrap();
    let model = BeanClass::<Conversation>::builder()
        .default_constructor(move || Conversation {
            destroyed: counter.clone(),
        })
        .disposable()
        .build();
    factory
        .register_definition(
            "conversation",
            BeanDefinition::new(model).with_scope(BeanScope::Custom("conversation".to_string())),
        )
        .unwrap();

    let first = factory.get_bean("conversation").unwrap();
    let second = factory.get_bean("conversation").unwrap();
    assert!(first.same_instance(&second));
    assert!(!factory.is_singleton("conversation").unwrap());
    assert!(!factory.is_prototype("conversation").unwrap());

    scope.reset();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    let third = factory.get_bean("conversation").unwrap();
    assert!(!first.same_instance(&third));
}

struct Repository;

struct Client {
    params: usize,
}

#[test]
fn test_greediest_satisfiable_constructor_is_chosen() {
    struct Mailer;
    let factory = DefaultBeanFactory::new(ContainerConfig::default());
    factory.add_post_processor(Arc::new(AutowiredPostProcessor::new()));
    factory
        .register_definition(
            "repository",
            BeanDefinition::new(BeanClass::<Repository>::builder().default_constructor(|| Repository).build()),
        )
        .unwrap();
    let model = BeanClass::<Client>::builder()
        .default_constructor(|| Client { params: 0 })
        .autowired_constructor(
            vec![ParameterInfo::of::<Repository>("repository")],
            Autowired::OPTIONAL,
            |args| {
                args.bean::<Repository>(0)?;
                Ok(Client { params: 1 })
            },
        )
        .autowired_constructor(
            vec![
                ParameterInfo::of::<Repository>("repository"),
                ParameterInfo::of::<Mailer>("mailer"),
            ],
            Autowired::OPTIONAL,
            |_| Ok(Client { params: 2 }),
        )
        .build();
    factory.register_definition("client", BeanDefinition::new(model)).unwrap();

    assert_eq!(factory.get_typed::<Client>("client").unwrap().params, 1);
    assert!(factory.is_type_match("client", TypeKey::of::<Client>()).unwrap());
}
