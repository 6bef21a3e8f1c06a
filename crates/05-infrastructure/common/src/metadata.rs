//! 元数据定义
//!
//! 提供类型键、类型信息与注解元数据

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 类型键
///
/// 可以表示具体类型，也可以表示 trait 对象（`dyn Trait`），用于按类型匹配 Bean
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 从类型获取类型键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// 类型ID
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 类型信息
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 类型名称
    pub name: String,
    /// 类型键
    pub key: TypeKey,
    /// 模块路径
    pub module_path: String,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        let key = TypeKey::of::<T>();
        Self {
            name: key.short_name().to_string(),
            key,
            module_path: key.name().to_string(),
        }
    }

    /// 使用自定义名称创建类型信息（用于代理等合成类型）
    pub fn named(key: TypeKey, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key,
            module_path: key.name().to_string(),
        }
    }

    /// 获取简短的类型名称
    pub fn short_name(&self) -> &str {
        short_type_name(&self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn short_type_name(name: &str) -> &str {
    // 泛型参数里也可能含有 "::"，只截取最外层路径
    let outer = name.split('<').next().unwrap_or(name);
    let start = outer.rfind("::").map(|idx| idx + 2).unwrap_or(0);
    &name[start..]
}

/// 注解
///
/// 由外部配置元数据源产生，容器只消费其结果
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// 注解名称
    pub name: String,
    /// 注解属性
    pub attributes: serde_json::Value,
}

impl Annotation {
    /// 创建无属性的注解
    pub fn marker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: serde_json::Value::Null,
        }
    }

    /// 创建带属性的注解
    pub fn with_attributes(name: impl Into<String>, attributes: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// 读取字符串属性
    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|value| value.as_str())
    }
}

/// 注解集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    /// 创建空集合
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// 添加注解
    pub fn push(&mut self, annotation: Annotation) {
        self.0.push(annotation);
    }

    /// 按名称查找
    pub fn find(&self, name: &str) -> Option<&Annotation> {
        self.0.iter().find(|annotation| annotation.name == name)
    }

    /// 是否存在
    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// 遍历
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }
}

impl FromIterator<Annotation> for Annotations {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter {}
    struct English;

    #[test]
    fn test_type_key_for_trait_objects() {
        let key = TypeKey::of::<dyn Greeter>();
        assert_ne!(key, TypeKey::of::<English>());
        assert_eq!(key, TypeKey::of::<dyn Greeter>());
        assert_eq!(TypeKey::of::<English>().short_name(), "English");
    }

    #[test]
    fn test_short_name_ignores_generic_paths() {
        let info = TypeInfo::of::<Vec<std::string::String>>();
        assert_eq!(info.short_name(), "Vec<alloc::string::String>");
    }

    #[test]
    fn test_annotation_lookup() {
        let annotations: Annotations = vec![
            Annotation::marker("primary"),
            Annotation::with_attributes("qualifier", serde_json::json!({ "value": "fast" })),
        ]
        .into_iter()
        .collect();

        assert!(annotations.has("primary"));
        assert_eq!(
            annotations.find("qualifier").and_then(|a| a.str_attribute("value")),
            Some("fast")
        );
        assert!(!annotations.has("lazy"));
    }
}
