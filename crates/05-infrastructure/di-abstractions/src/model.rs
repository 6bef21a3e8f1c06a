//! 组件模型抽象
//!
//! 容器本身不做反射：构造实例、写入属性、调用方法、判断类型都经由
//! [`ComponentModel`] 完成。默认实现由 `di-impl` 中的 `BeanClass` 构建器提供。

use crate::value::{Args, DynValue};
use infrastructure_common::{Annotations, BoxError, TypeInfo, TypeKey};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 容器中共享的对象引用
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// 自动装配标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Autowired {
    /// 缺少依赖时是否失败
    pub required: bool,
}

impl Autowired {
    pub const REQUIRED: Autowired = Autowired { required: true };
    pub const OPTIONAL: Autowired = Autowired { required: false };
}

/// 构造器或方法参数
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// 参数名称，按名称消歧时使用
    pub name: String,
    /// 依赖类型；集合参数时为元素类型
    pub type_key: TypeKey,
    /// 是否注入全部匹配的 Bean
    pub multiple: bool,
    /// 是否必需
    pub required: bool,
    /// 限定符
    pub qualifier: Option<String>,
}

impl ParameterInfo {
    /// 单个依赖参数
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_key: TypeKey::of::<T>(),
            multiple: false,
            required: true,
            qualifier: None,
        }
    }

    /// 集合依赖参数
    pub fn many<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            multiple: true,
            ..Self::of::<T>(name)
        }
    }

    /// 标记为可选
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// 设置限定符
    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

/// 构造器描述
#[derive(Debug, Clone)]
pub struct ConstructorInfo {
    /// 参数列表
    pub params: Vec<ParameterInfo>,
    /// 自动装配标记
    pub autowired: Option<Autowired>,
}

impl ConstructorInfo {
    /// 参数数量
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// 是否无参构造器
    pub fn is_default(&self) -> bool {
        self.params.is_empty()
    }

    /// 参数类型签名
    pub fn signature(&self) -> Vec<TypeKey> {
        self.params.iter().map(|param| param.type_key).collect()
    }
}

/// 可写属性描述
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    /// 属性名称
    pub name: String,
    /// 依赖类型；集合属性时为元素类型
    pub type_key: TypeKey,
    /// 是否注入全部匹配的 Bean
    pub multiple: bool,
    /// 自动装配标记
    pub autowired: Option<Autowired>,
    /// 限定符
    pub qualifier: Option<String>,
}

/// 方法描述
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// 方法名称
    pub name: String,
    /// 参数列表
    pub params: Vec<ParameterInfo>,
    /// 方法注解
    pub annotations: Annotations,
}

impl MethodInfo {
    /// 无参方法
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            annotations: Annotations::new(),
        }
    }
}

/// 组件模型
///
/// 描述一种组件类型能被容器执行的全部操作。实现必须是无状态的描述对象，
/// 实例状态只存在于 [`ObjectRef`] 中。
pub trait ComponentModel: Send + Sync + 'static {
    /// 类型信息
    fn type_info(&self) -> &TypeInfo;

    /// 实例能否作为指定类型使用（自身类型或已声明的 trait 视图）
    fn is_assignable_to(&self, key: TypeKey) -> bool;

    /// 获取实例的类型视图，返回值装箱的是 `Arc<U>`
    fn cast(&self, object: &ObjectRef, key: TypeKey) -> Option<Box<dyn Any + Send + Sync>>;

    /// 为代理构造 trait 视图，调用经由代理分派
    fn proxy_view(&self, _key: TypeKey, _proxy: &BeanInstance) -> Option<Box<dyn Any + Send + Sync>> {
        None
    }

    /// 构造器列表，按声明顺序
    fn constructors(&self) -> &[ConstructorInfo];

    /// 使用指定构造器创建实例
    fn instantiate(&self, index: usize, args: Args) -> Result<ObjectRef, BoxError>;

    /// 静态工厂方法列表
    fn static_methods(&self) -> &[MethodInfo] {
        &[]
    }

    /// 调用静态工厂方法
    fn invoke_static(&self, method: &str, _args: Args) -> Result<ObjectRef, BoxError> {
        Err(format!("类型 {} 没有静态方法 '{}'", self.type_info(), method).into())
    }

    /// 可写属性列表
    fn properties(&self) -> &[PropertyInfo] {
        &[]
    }

    /// 写入属性
    fn set_property(&self, object: &ObjectRef, name: &str, value: DynValue) -> Result<(), BoxError>;

    /// 实例方法列表
    fn methods(&self) -> &[MethodInfo] {
        &[]
    }

    /// 调用实例方法
    fn invoke(&self, object: &ObjectRef, method: &str, args: Args) -> Result<DynValue, BoxError>;

    /// 类级注解
    fn annotations(&self) -> &Annotations;

    /// 代理背后的目标对象
    fn target_of(&self, _object: &ObjectRef) -> Option<BeanInstance> {
        None
    }

    /// 是否代理模型
    fn is_proxy(&self) -> bool {
        false
    }

    /// 按名称查找方法
    fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods().iter().find(|method| method.name == name)
    }

    /// 按名称查找属性
    fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties().iter().find(|property| property.name == name)
    }
}

impl fmt::Debug for dyn ComponentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentModel({})", self.type_info())
    }
}

/// Bean 实例
///
/// 对象引用与能操作它的组件模型。克隆只复制引用，实例身份以对象指针判断。
#[derive(Clone)]
pub struct BeanInstance {
    object: ObjectRef,
    model: Arc<dyn ComponentModel>,
}

impl BeanInstance {
    /// 包装已有对象
    pub fn new(object: ObjectRef, model: Arc<dyn ComponentModel>) -> Self {
        Self { object, model }
    }

    /// 包装新值
    pub fn of<T: Any + Send + Sync>(value: T, model: Arc<dyn ComponentModel>) -> Self {
        Self::new(Arc::new(value), model)
    }

    /// 对象引用
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    /// 组件模型
    pub fn model(&self) -> &Arc<dyn ComponentModel> {
        &self.model
    }

    /// 类型信息
    pub fn type_info(&self) -> &TypeInfo {
        self.model.type_info()
    }

    /// 能否作为指定类型使用
    pub fn is_assignable_to(&self, key: TypeKey) -> bool {
        self.model.is_assignable_to(key)
    }

    /// 是否同一个实例
    pub fn same_instance(&self, other: &BeanInstance) -> bool {
        Arc::as_ptr(&self.object) as *const () == Arc::as_ptr(&other.object) as *const ()
    }

    /// 是否包装了指定对象
    pub fn wraps(&self, object: &ObjectRef) -> bool {
        Arc::as_ptr(&self.object) as *const () == Arc::as_ptr(object) as *const ()
    }

    /// 还原为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    /// 获取类型视图，`U` 可以是具体类型也可以是 `dyn Trait`
    pub fn cast<U: ?Sized + 'static>(&self) -> Option<Arc<U>> {
        let boxed = self.model.cast(&self.object, TypeKey::of::<U>())?;
        boxed.downcast::<Arc<U>>().ok().map(|view| *view)
    }

    /// 写入属性
    pub fn set_property(&self, name: &str, value: DynValue) -> Result<(), BoxError> {
        self.model.set_property(&self.object, name, value)
    }

    /// 调用方法
    pub fn invoke(&self, method: &str, args: Args) -> Result<DynValue, BoxError> {
        self.model.invoke(&self.object, method, args)
    }

    /// 是否代理
    pub fn is_proxy(&self) -> bool {
        self.model.is_proxy()
    }

    /// 代理背后的目标
    pub fn target(&self) -> Option<BeanInstance> {
        self.model.target_of(&self.object)
    }

    /// 逐层解开代理后的最终目标
    pub fn ultimate_target(&self) -> BeanInstance {
        let mut current = self.clone();
        while let Some(next) = current.target() {
            current = next;
        }
        current
    }
}

impl fmt::Debug for BeanInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInstance")
            .field("type", &self.type_info().name)
            .field("address", &(Arc::as_ptr(&self.object) as *const ()))
            .finish()
    }
}
