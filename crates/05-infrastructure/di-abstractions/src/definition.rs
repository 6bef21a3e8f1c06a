//! Bean 定义
//!
//! 定义描述"如何创建"一个 Bean。子定义通过 [`BeanDefinition::merge_with_parent`]
//! 与父定义合并为扁平的有效定义，合并结果不再修改。

use crate::model::{ComponentModel, ObjectRef};
use crate::value::DynValue;
use infrastructure_common::{BeanResult, BeanScope, BoxError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 实例提供者
pub type InstanceSupplier = Arc<dyn Fn() -> Result<ObjectRef, BoxError> + Send + Sync>;

/// 自动装配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutowireMode {
    /// 不自动装配
    #[default]
    No,
    /// 按属性名称
    ByName,
    /// 按属性类型
    ByType,
    /// 构造器自动装配
    Constructor,
}

/// Bean 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeanRole {
    /// 应用组件
    #[default]
    Application,
    /// 容器内部基础设施
    Infrastructure,
}

/// 属性值
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// 字面量
    Value(serde_json::Value),
    /// 引用其他 Bean
    Reference(String),
    /// 内部 Bean 定义
    Inner(Box<BeanDefinition>),
    /// 有序集合
    List(Vec<PropertyValue>),
    /// 已解析的值，按原样写入
    Resolved(DynValue),
}

impl PropertyValue {
    /// 字面量
    pub fn value(value: impl Into<serde_json::Value>) -> Self {
        Self::Value(value.into())
    }

    /// Bean 引用
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }
}

/// 属性值集合，保持声明顺序
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
    values: Vec<(String, PropertyValue)>,
}

impl PropertyValues {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加或替换属性值
    pub fn add(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// 获取属性值
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// 是否包含属性
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 移除属性
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let index = self.values.iter().position(|(existing, _)| existing == name)?;
        Some(self.values.remove(index).1)
    }

    /// 遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// 属性数量
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 用另一个集合覆盖同名属性
    pub fn merge(&mut self, other: &PropertyValues) {
        for (name, value) in other.iter() {
            self.add(name, value.clone());
        }
    }
}

/// Bean 定义
#[derive(Clone)]
pub struct BeanDefinition {
    /// 组件模型；子定义可以继承父定义的模型
    pub class: Option<Arc<dyn ComponentModel>>,
    /// 父定义名称
    pub parent: Option<String>,
    /// 作用域，未设置时为单例
    pub scope: Option<BeanScope>,
    /// 是否延迟初始化
    pub lazy_init: Option<bool>,
    /// 是否首选候选
    pub primary: bool,
    /// 优先级，数值越大越优先
    pub priority: Option<i32>,
    /// 是否参与按类型自动装配
    pub autowire_candidate: bool,
    /// 限定符
    pub qualifiers: Vec<String>,
    /// 自动装配模式
    pub autowire_mode: AutowireMode,
    /// 按位置给出的构造器参数
    pub constructor_args: BTreeMap<usize, PropertyValue>,
    /// 属性值
    pub property_values: PropertyValues,
    /// 初始化方法名
    pub init_method: Option<String>,
    /// 销毁方法名
    pub destroy_method: Option<String>,
    /// 必须先创建的 Bean
    pub depends_on: Vec<String>,
    /// 工厂 Bean 名称
    pub factory_bean_name: Option<String>,
    /// 工厂方法名称
    pub factory_method_name: Option<String>,
    /// 实例提供者
    pub instance_supplier: Option<InstanceSupplier>,
    /// 是否抽象定义
    pub is_abstract: bool,
    /// 角色
    pub role: BeanRole,
    /// 描述
    pub description: Option<String>,
}

impl Default for BeanDefinition {
    fn default() -> Self {
        Self {
            class: None,
            parent: None,
            scope: None,
            lazy_init: None,
            primary: false,
            priority: None,
            autowire_candidate: true,
            qualifiers: Vec::new(),
            autowire_mode: AutowireMode::No,
            constructor_args: BTreeMap::new(),
            property_values: PropertyValues::new(),
            init_method: None,
            destroy_method: None,
            depends_on: Vec::new(),
            factory_bean_name: None,
            factory_method_name: None,
            instance_supplier: None,
            is_abstract: false,
            role: BeanRole::Application,
            description: None,
        }
    }
}

impl BeanDefinition {
    /// 基于组件模型创建定义
    pub fn new(class: Arc<dyn ComponentModel>) -> Self {
        Self {
            class: Some(class),
            ..Self::default()
        }
    }

    /// 创建继承指定父定义的子定义
    pub fn child(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: BeanScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// 设置为原型作用域
    pub fn prototype(self) -> Self {
        self.with_scope(BeanScope::Prototype)
    }

    /// 设置延迟初始化
    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    /// 标记为首选
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 设置是否参与自动装配
    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    /// 添加限定符
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifiers.push(qualifier.into());
        self
    }

    /// 设置自动装配模式
    pub fn with_autowire_mode(mut self, mode: AutowireMode) -> Self {
        self.autowire_mode = mode;
        self
    }

    /// 设置构造器参数
    pub fn with_constructor_arg(mut self, index: usize, value: PropertyValue) -> Self {
        self.constructor_args.insert(index, value);
        self
    }

    /// 设置属性
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.property_values.add(name, value);
        self
    }

    /// 设置字面量属性
    pub fn with_value(self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.with_property(name, PropertyValue::value(value))
    }

    /// 设置引用属性
    pub fn with_reference(self, name: impl Into<String>, bean_name: impl Into<String>) -> Self {
        self.with_property(name, PropertyValue::reference(bean_name))
    }

    /// 设置初始化方法
    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    /// 设置销毁方法
    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    /// 添加前置依赖
    pub fn with_depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// 使用模型上的静态工厂方法
    pub fn with_factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method_name = Some(method.into());
        self
    }

    /// 使用其他 Bean 上的工厂方法
    pub fn with_factory_bean(mut self, bean_name: impl Into<String>, method: impl Into<String>) -> Self {
        self.factory_bean_name = Some(bean_name.into());
        self.factory_method_name = Some(method.into());
        self
    }

    /// 使用实例提供者
    pub fn with_supplier<F>(mut self, supplier: F) -> Self
    where
        F: Fn() -> Result<ObjectRef, BoxError> + Send + Sync + 'static,
    {
        self.instance_supplier = Some(Arc::new(supplier));
        self
    }

    /// 标记为抽象定义
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// 设置角色
    pub fn with_role(mut self, role: BeanRole) -> Self {
        self.role = role;
        self
    }

    /// 设置描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 生效的作用域
    pub fn effective_scope(&self) -> BeanScope {
        self.scope.clone().unwrap_or_default()
    }

    /// 是否单例
    pub fn is_singleton(&self) -> bool {
        self.effective_scope().is_singleton()
    }

    /// 是否原型
    pub fn is_prototype(&self) -> bool {
        self.effective_scope().is_prototype()
    }

    /// 是否延迟初始化
    pub fn is_lazy(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    /// 是否通过工厂方法创建
    pub fn uses_factory_method(&self) -> bool {
        self.factory_method_name.is_some()
    }

    /// 以合并后的父定义为基础，用本定义中显式设置的部分覆盖
    pub fn merge_with_parent(&self, parent: &BeanDefinition) -> BeanDefinition {
        let mut merged = parent.clone();
        merged.parent = None;
        if self.class.is_some() {
            merged.class = self.class.clone();
        }
        if self.scope.is_some() {
            merged.scope = self.scope.clone();
        }
        if self.lazy_init.is_some() {
            merged.lazy_init = self.lazy_init;
        }
        if self.priority.is_some() {
            merged.priority = self.priority;
        }
        if self.init_method.is_some() {
            merged.init_method = self.init_method.clone();
        }
        if self.destroy_method.is_some() {
            merged.destroy_method = self.destroy_method.clone();
        }
        if self.factory_bean_name.is_some() {
            merged.factory_bean_name = self.factory_bean_name.clone();
        }
        if self.factory_method_name.is_some() {
            merged.factory_method_name = self.factory_method_name.clone();
        }
        if self.instance_supplier.is_some() {
            merged.instance_supplier = self.instance_supplier.clone();
        }
        if self.description.is_some() {
            merged.description = self.description.clone();
        }
        merged.is_abstract = self.is_abstract;
        merged.primary = self.primary;
        merged.autowire_candidate = self.autowire_candidate;
        merged.autowire_mode = self.autowire_mode;
        merged.role = self.role;
        merged.depends_on = self.depends_on.clone();
        for qualifier in &self.qualifiers {
            if !merged.qualifiers.contains(qualifier) {
                merged.qualifiers.push(qualifier.clone());
            }
        }
        for (index, value) in &self.constructor_args {
            merged.constructor_args.insert(*index, value.clone());
        }
        merged.property_values.merge(&self.property_values);
        merged
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("class", &self.class.as_ref().map(|class| class.type_info().name.clone()))
            .field("parent", &self.parent)
            .field("scope", &self.effective_scope())
            .field("lazy_init", &self.is_lazy())
            .field("primary", &self.primary)
            .field("priority", &self.priority)
            .field("autowire_mode", &self.autowire_mode)
            .field("depends_on", &self.depends_on)
            .field("factory_bean_name", &self.factory_bean_name)
            .field("factory_method_name", &self.factory_method_name)
            .field("abstract", &self.is_abstract)
            .finish_non_exhaustive()
    }
}

/// Bean 定义存储
///
/// 名称到定义的映射，以及别名登记。实现需保证并发安全。
pub trait DefinitionRegistry: Send + Sync {
    /// 注册定义
    fn register_definition(&self, name: &str, definition: BeanDefinition) -> BeanResult<()>;

    /// 移除定义
    fn remove_definition(&self, name: &str) -> BeanResult<()>;

    /// 获取原始定义
    fn definition(&self, name: &str) -> Option<Arc<BeanDefinition>>;

    /// 是否包含定义
    fn contains_definition(&self, name: &str) -> bool;

    /// 全部定义名称，按注册顺序
    fn definition_names(&self) -> Vec<String>;

    /// 定义数量
    fn definition_count(&self) -> usize {
        self.definition_names().len()
    }

    /// 获取合并后的定义
    fn merged_definition(&self, name: &str) -> BeanResult<Arc<BeanDefinition>>;

    /// 注册别名
    fn register_alias(&self, name: &str, alias: &str) -> BeanResult<()>;

    /// 移除别名
    fn remove_alias(&self, alias: &str) -> BeanResult<()>;

    /// 解析别名得到规范名称
    fn canonical_name(&self, name: &str) -> String;

    /// 指定名称的全部别名
    fn aliases(&self, name: &str) -> Vec<String>;
}
