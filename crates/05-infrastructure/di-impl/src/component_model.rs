//! 基于构建器的组件模型
//!
//! [`BeanClass`] 用闭包描述一种组件类型的构造器、属性写入、方法调用与
//! trait 视图，是 [`ComponentModel`] 的默认实现。

use di_abstractions::{
    Args, Autowired, BeanFactoryAware, BeanInstance, ComponentModel, ConstructorInfo, DynValue,
    FactoryBean, MethodInfo, ObjectRef, ParameterInfo, PropertyInfo, SmartInitializingSingleton,
};
use infrastructure_common::{
    Annotation, Annotations, BeanNameAware, BoxError, DisposableBean, InitializingBean, Lifecycle,
    TypeInfo, TypeKey,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type Caster<T> = Arc<dyn Fn(Arc<T>) -> Box<dyn Any + Send + Sync> + Send + Sync>;
type ConstructorFn<T> = Arc<dyn Fn(Args) -> Result<T, BoxError> + Send + Sync>;
type StaticFn = Arc<dyn Fn(Args) -> Result<ObjectRef, BoxError> + Send + Sync>;
type SetterFn<T> = Arc<dyn Fn(&T, DynValue) -> Result<(), BoxError> + Send + Sync>;
type MethodFn<T> = Arc<dyn Fn(&T, Args) -> Result<DynValue, BoxError> + Send + Sync>;
type ProxyViewFn = Arc<dyn Fn(BeanInstance) -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// 组件类型描述
pub struct BeanClass<T: Any + Send + Sync> {
    type_info: TypeInfo,
    casters: HashMap<TypeKey, Caster<T>>,
    proxy_views: HashMap<TypeKey, ProxyViewFn>,
    constructors: Vec<ConstructorInfo>,
    constructor_fns: Vec<ConstructorFn<T>>,
    static_methods: Vec<MethodInfo>,
    static_fns: HashMap<String, StaticFn>,
    properties: Vec<PropertyInfo>,
    setters: HashMap<String, SetterFn<T>>,
    methods: Vec<MethodInfo>,
    method_fns: HashMap<String, MethodFn<T>>,
    annotations: Annotations,
}

impl<T: Any + Send + Sync> BeanClass<T> {
    /// 开始描述类型 `T`
    pub fn builder() -> BeanClassBuilder<T> {
        BeanClassBuilder::new()
    }

    fn downcast(&self, object: &ObjectRef) -> Result<Arc<T>, BoxError> {
        object.clone().downcast::<T>().map_err(|_| {
            BoxError::from(format!("对象不是 {} 的实例", self.type_info.name))
        })
    }
}

impl<T: Any + Send + Sync> ComponentModel for BeanClass<T> {
    fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    fn is_assignable_to(&self, key: TypeKey) -> bool {
        key == TypeKey::of::<T>() || self.casters.contains_key(&key)
    }

    fn cast(&self, object: &ObjectRef, key: TypeKey) -> Option<Box<dyn Any + Send + Sync>> {
        let typed = object.clone().downcast::<T>().ok()?;
        if key == TypeKey::of::<T>() {
            return Some(Box::new(typed));
        }
        self.casters.get(&key).map(|caster| caster(typed))
    }

    fn proxy_view(&self, key: TypeKey, proxy: &BeanInstance) -> Option<Box<dyn Any + Send + Sync>> {
        self.proxy_views.get(&key).map(|view| view(proxy.clone()))
    }

    fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    fn instantiate(&self, index: usize, args: Args) -> Result<ObjectRef, BoxError> {
        let constructor = self.constructor_fns.get(index).ok_or_else(|| {
            BoxError::from(format!("类型 {} 没有第 {} 个构造器", self.type_info.name, index))
        })?;
        let value = constructor(args)?;
        Ok(Arc::new(value))
    }

    fn static_methods(&self) -> &[MethodInfo] {
        &self.static_methods
    }

    fn invoke_static(&self, method: &str, args: Args) -> Result<ObjectRef, BoxError> {
        let function = self.static_fns.get(method).ok_or_else(|| {
            BoxError::from(format!("类型 {} 没有静态方法 '{}'", self.type_info.name, method))
        })?;
        function(args)
    }

    fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    fn set_property(&self, object: &ObjectRef, name: &str, value: DynValue) -> Result<(), BoxError> {
        let setter = self.setters.get(name).ok_or_else(|| {
            BoxError::from(format!("类型 {} 没有可写属性 '{}'", self.type_info.name, name))
        })?;
        let typed = self.downcast(object)?;
        setter(&typed, value)
    }

    fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    fn invoke(&self, object: &ObjectRef, method: &str, args: Args) -> Result<DynValue, BoxError> {
        let function = self.method_fns.get(method).ok_or_else(|| {
            BoxError::from(format!("类型 {} 没有方法 '{}'", self.type_info.name, method))
        })?;
        let typed = self.downcast(object)?;
        function(&typed, args)
    }

    fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

/// [`BeanClass`] 构建器
pub struct BeanClassBuilder<T: Any + Send + Sync> {
    class: BeanClass<T>,
}

impl<T: Any + Send + Sync> BeanClassBuilder<T> {
    fn new() -> Self {
        Self {
            class: BeanClass {
                type_info: TypeInfo::of::<T>(),
                casters: HashMap::new(),
                proxy_views: HashMap::new(),
                constructors: Vec::new(),
                constructor_fns: Vec::new(),
                static_methods: Vec::new(),
                static_fns: HashMap::new(),
                properties: Vec::new(),
                setters: HashMap::new(),
                methods: Vec::new(),
                method_fns: HashMap::new(),
                annotations: Annotations::new(),
            },
        }
    }

    /// 声明 trait 视图，`U` 通常是 `dyn Trait`
    pub fn implements<U: ?Sized + Send + Sync + 'static>(mut self, view: fn(Arc<T>) -> Arc<U>) -> Self {
        self.class.casters.insert(
            TypeKey::of::<U>(),
            Arc::new(move |object: Arc<T>| Box::new(view(object)) as Box<dyn Any + Send + Sync>),
        );
        self
    }

    /// 声明代理上的 trait 视图：调用经由 [`BeanInstance::invoke`] 分派到拦截器链
    pub fn proxy_view<U: ?Sized + Send + Sync + 'static>(
        mut self,
        view: fn(BeanInstance) -> Arc<U>,
    ) -> Self {
        self.class.proxy_views.insert(
            TypeKey::of::<U>(),
            Arc::new(move |proxy: BeanInstance| Box::new(view(proxy)) as Box<dyn Any + Send + Sync>),
        );
        self
    }

    /// 无参构造器
    pub fn default_constructor<F>(self, constructor: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.push_constructor(Vec::new(), None, move |_: Args| Ok(constructor()))
    }

    /// 未标记自动装配的构造器
    pub fn constructor<F>(self, params: Vec<ParameterInfo>, constructor: F) -> Self
    where
        F: Fn(Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push_constructor(params, None, constructor)
    }

    /// 标记自动装配的构造器
    pub fn autowired_constructor<F>(self, params: Vec<ParameterInfo>, autowired: Autowired, constructor: F) -> Self
    where
        F: Fn(Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.push_constructor(params, Some(autowired), constructor)
    }

    fn push_constructor<F>(mut self, params: Vec<ParameterInfo>, autowired: Option<Autowired>, constructor: F) -> Self
    where
        F: Fn(Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.class.constructors.push(ConstructorInfo { params, autowired });
        self.class.constructor_fns.push(Arc::new(constructor));
        self
    }

    /// 静态工厂方法，产物是 `T` 的实例
    pub fn static_method<F>(mut self, info: MethodInfo, function: F) -> Self
    where
        F: Fn(Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.class.static_fns.insert(
            info.name.clone(),
            Arc::new(move |args: Args| -> Result<ObjectRef, BoxError> {
                Ok(Arc::new(function(args)?))
            }),
        );
        self.class.static_methods.push(info);
        self
    }

    /// 字面量属性
    pub fn value_property<F>(self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&T, DynValue) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let info = PropertyInfo {
            name: name.into(),
            type_key: TypeKey::of::<serde_json::Value>(),
            multiple: false,
            autowired: None,
            qualifier: None,
        };
        self.property_with(info, setter)
    }

    /// 引用类型为 `D` 的属性，可由引用配置或按名称、按类型装配写入
    pub fn reference_property<D: ?Sized + 'static, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&T, DynValue) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let info = PropertyInfo {
            name: name.into(),
            type_key: TypeKey::of::<D>(),
            multiple: false,
            autowired: None,
            qualifier: None,
        };
        self.property_with(info, setter)
    }

    /// 自动装配的属性
    pub fn autowired_property<D: ?Sized + 'static, F>(
        self,
        name: impl Into<String>,
        autowired: Autowired,
        setter: F,
    ) -> Self
    where
        F: Fn(&T, DynValue) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let info = PropertyInfo {
            name: name.into(),
            type_key: TypeKey::of::<D>(),
            multiple: false,
            autowired: Some(autowired),
            qualifier: None,
        };
        self.property_with(info, setter)
    }

    /// 自动装配全部匹配 Bean 的集合属性
    pub fn autowired_collection<D: ?Sized + 'static, F>(
        self,
        name: impl Into<String>,
        autowired: Autowired,
        setter: F,
    ) -> Self
    where
        F: Fn(&T, DynValue) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let info = PropertyInfo {
            name: name.into(),
            type_key: TypeKey::of::<D>(),
            multiple: true,
            autowired: Some(autowired),
            qualifier: None,
        };
        self.property_with(info, setter)
    }

    /// 按完整描述声明属性
    pub fn property_with<F>(mut self, info: PropertyInfo, setter: F) -> Self
    where
        F: Fn(&T, DynValue) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.class.setters.insert(info.name.clone(), Arc::new(setter));
        self.class.properties.retain(|existing| existing.name != info.name);
        self.class.properties.push(info);
        self
    }

    /// 按名称声明实例方法
    pub fn method<F>(self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&T, Args) -> Result<DynValue, BoxError> + Send + Sync + 'static,
    {
        self.method_with(MethodInfo::named(name), function)
    }

    /// 按完整描述声明实例方法
    pub fn method_with<F>(mut self, info: MethodInfo, function: F) -> Self
    where
        F: Fn(&T, Args) -> Result<DynValue, BoxError> + Send + Sync + 'static,
    {
        self.class.method_fns.insert(info.name.clone(), Arc::new(function));
        self.class.methods.retain(|existing| existing.name != info.name);
        self.class.methods.push(info);
        self
    }

    /// 类级注解
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.class.annotations.push(annotation);
        self
    }

    /// 完成描述
    pub fn build(self) -> Arc<dyn ComponentModel> {
        Arc::new(self.class)
    }
}

impl<T: Any + Send + Sync> BeanClassBuilder<T> {
    /// 声明 [`InitializingBean`] 能力
    pub fn initializing(self) -> Self
    where
        T: InitializingBean,
    {
        self.implements::<dyn InitializingBean>(|bean| bean)
    }

    /// 声明 [`DisposableBean`] 能力
    pub fn disposable(self) -> Self
    where
        T: DisposableBean,
    {
        self.implements::<dyn DisposableBean>(|bean| bean)
    }

    /// 声明 [`BeanNameAware`] 能力
    pub fn name_aware(self) -> Self
    where
        T: BeanNameAware,
    {
        self.implements::<dyn BeanNameAware>(|bean| bean)
    }

    /// 声明 [`BeanFactoryAware`] 能力
    pub fn factory_aware(self) -> Self
    where
        T: BeanFactoryAware,
    {
        self.implements::<dyn BeanFactoryAware>(|bean| bean)
    }

    /// 声明 [`FactoryBean`] 能力
    pub fn factory_bean(self) -> Self
    where
        T: FactoryBean,
    {
        self.implements::<dyn FactoryBean>(|bean| bean)
    }

    /// 声明 [`SmartInitializingSingleton`] 能力
    pub fn smart_initializing(self) -> Self
    where
        T: SmartInitializingSingleton,
    {
        self.implements::<dyn SmartInitializingSingleton>(|bean| bean)
    }

    /// 声明 [`Lifecycle`] 能力
    pub fn lifecycle(self) -> Self
    where
        T: Lifecycle,
    {
        self.implements::<dyn Lifecycle>(|bean| bean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English {
        name: Mutex<String>,
    }

    impl Greeter for English {
        fn greet(&self) -> String {
            format!("Hello, {}", self.name.lock())
        }
    }

    fn english_model() -> Arc<dyn ComponentModel> {
        BeanClass::<English>::builder()
            .default_constructor(|| English {
                name: Mutex::new("world".to_string()),
            })
            .implements::<dyn Greeter>(|bean| bean)
            .value_property("name", |bean, value| {
                *bean.name.lock() = value.to::<String>()?;
                Ok(())
            })
            .method("greet", |bean, _| Ok(DynValue::from(serde_json::json!(bean.greet()))))
            .build()
    }

    #[test]
    fn test_instantiate_and_cast_to_trait_view() {
        let model = english_model();
        let object = model.instantiate(0, Args::empty()).unwrap();
        let bean = BeanInstance::new(object, model.clone());

        assert!(bean.is_assignable_to(TypeKey::of::<dyn Greeter>()));
        assert!(!bean.is_assignable_to(TypeKey::of::<String>()));
        let greeter = bean.cast::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "Hello, world");
        assert!(bean.downcast::<English>().is_some());
    }

    #[test]
    fn test_property_and_method_dispatch() {
        let model = english_model();
        let bean = BeanInstance::new(model.instantiate(0, Args::empty()).unwrap(), model);

        bean.set_property("name", DynValue::from(serde_json::json!("容器")))
            .unwrap();
        let greeting = bean.invoke("greet", Args::empty()).unwrap();
        assert_eq!(greeting.to::<String>().unwrap(), "Hello, 容器");

        assert!(bean.invoke("missing", Args::empty()).is_err());
        assert!(bean.set_property("missing", DynValue::Null).is_err());
    }
}
