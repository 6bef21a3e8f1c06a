//! 依赖描述符

use crate::model::{ParameterInfo, PropertyInfo};
use infrastructure_common::{TypeInfo, TypeKey};
use std::fmt;

/// 注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionPoint {
    /// 字段或属性
    Field { name: String },
    /// 构造器或方法参数
    Parameter { executable: String, index: usize },
    /// 直接按类型查找
    Lookup,
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { name } => write!(f, "字段 '{}'", name),
            Self::Parameter { executable, index } => {
                write!(f, "'{}' 的第 {} 个参数", executable, index)
            }
            Self::Lookup => f.write_str("类型查找"),
        }
    }
}

/// 依赖描述符
///
/// 描述一个注入点需要什么。每次注入新建；解析出唯一 Bean 后可缓存为
/// 带有 `shortcut` 的快捷形式，下次直接按名称获取。
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    /// 声明注入点的类型
    pub declaring_type: Option<TypeInfo>,
    /// 注入点
    pub injection_point: InjectionPoint,
    /// 依赖类型；集合依赖时为元素类型
    pub dependency_type: TypeKey,
    /// 是否注入全部匹配的 Bean
    pub multiple: bool,
    /// 是否必需
    pub required: bool,
    /// 限定符
    pub qualifier: Option<String>,
    /// 字段或参数名称，多候选时用于按名称消歧
    pub name: Option<String>,
    /// 是否允许为判断类型而提前初始化候选
    pub eager: bool,
    /// 已解析的目标 Bean 名称
    pub shortcut: Option<String>,
}

impl DependencyDescriptor {
    /// 按类型查找
    pub fn for_type(dependency_type: TypeKey) -> Self {
        Self {
            declaring_type: None,
            injection_point: InjectionPoint::Lookup,
            dependency_type,
            multiple: false,
            required: true,
            qualifier: None,
            name: None,
            eager: true,
            shortcut: None,
        }
    }

    /// 字段或属性注入点
    pub fn for_property(declaring_type: &TypeInfo, property: &PropertyInfo, required: bool) -> Self {
        Self {
            declaring_type: Some(declaring_type.clone()),
            injection_point: InjectionPoint::Field {
                name: property.name.clone(),
            },
            dependency_type: property.type_key,
            multiple: property.multiple,
            required,
            qualifier: property.qualifier.clone(),
            name: Some(property.name.clone()),
            eager: true,
            shortcut: None,
        }
    }

    /// 构造器或方法参数注入点
    pub fn for_parameter(
        declaring_type: &TypeInfo,
        executable: &str,
        index: usize,
        parameter: &ParameterInfo,
    ) -> Self {
        Self {
            declaring_type: Some(declaring_type.clone()),
            injection_point: InjectionPoint::Parameter {
                executable: executable.to_string(),
                index,
            },
            dependency_type: parameter.type_key,
            multiple: parameter.multiple,
            required: parameter.required,
            qualifier: parameter.qualifier.clone(),
            name: Some(parameter.name.clone()),
            eager: true,
            shortcut: None,
        }
    }

    /// 集合依赖
    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// 设置是否必需
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// 设置限定符
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// 设置是否允许提前初始化
    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    /// 转为指向已知 Bean 的快捷形式
    pub fn with_shortcut(&self, bean_name: impl Into<String>) -> Self {
        let mut shortcut = self.clone();
        shortcut.shortcut = Some(bean_name.into());
        shortcut
    }

    /// 注入点描述
    pub fn describe(&self) -> String {
        match &self.declaring_type {
            Some(declaring) => format!("{} 的{}", declaring.short_name(), self.injection_point),
            None => self.injection_point.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repository;
    struct Service;

    #[test]
    fn test_parameter_descriptor_carries_metadata() {
        let parameter = ParameterInfo::of::<Repository>("repository").qualified("main");
        let descriptor =
            DependencyDescriptor::for_parameter(&TypeInfo::of::<Service>(), "new", 0, &parameter);

        assert_eq!(descriptor.dependency_type, TypeKey::of::<Repository>());
        assert_eq!(descriptor.qualifier.as_deref(), Some("main"));
        assert!(descriptor.required);
        assert_eq!(descriptor.describe(), "Service 的'new' 的第 0 个参数");
    }

    #[test]
    fn test_shortcut_keeps_original_descriptor() {
        let descriptor = DependencyDescriptor::for_type(TypeKey::of::<Repository>());
        let shortcut = descriptor.with_shortcut("repository");
        assert!(descriptor.shortcut.is_none());
        assert_eq!(shortcut.shortcut.as_deref(), Some("repository"));
    }
}
