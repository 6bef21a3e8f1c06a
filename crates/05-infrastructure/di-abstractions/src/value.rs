//! 注入值与调用参数

use crate::model::{BeanInstance, ObjectRef};
use infrastructure_common::BoxError;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::Arc;

/// 动态值
///
/// 属性注入、构造器参数、方法参数与返回值的统一表示
#[derive(Debug, Clone)]
pub enum DynValue {
    /// 空值
    Null,
    /// 字面量
    Value(serde_json::Value),
    /// 容器管理的 Bean
    Bean(BeanInstance),
    /// 不受容器管理的对象
    Object(ObjectRef),
    /// 有序集合
    List(Vec<DynValue>),
}

impl DynValue {
    /// 包装任意对象
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    /// 是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 字面量
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Bean 实例
    pub fn as_bean(&self) -> Option<&BeanInstance> {
        match self {
            Self::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// 集合元素
    pub fn as_list(&self) -> Option<&[DynValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// 反序列化字面量
    pub fn to<T: DeserializeOwned>(&self) -> Result<T, BoxError> {
        match self {
            Self::Null => Ok(serde_json::from_value(serde_json::Value::Null)?),
            Self::Value(value) => Ok(serde_json::from_value(value.clone())?),
            other => Err(format!("无法将 {:?} 转换为字面量", other).into()),
        }
    }

    /// 还原为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Bean(bean) => bean.downcast(),
            Self::Object(object) => object.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// 获取 Bean 的类型视图
    pub fn cast<U: ?Sized + 'static>(&self) -> Option<Arc<U>> {
        self.as_bean().and_then(|bean| bean.cast::<U>())
    }

    /// 收集其中的全部 Bean
    pub fn beans(&self) -> Vec<BeanInstance> {
        match self {
            Self::Bean(bean) => vec![bean.clone()],
            Self::List(items) => items.iter().flat_map(DynValue::beans).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<serde_json::Value> for DynValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<BeanInstance> for DynValue {
    fn from(bean: BeanInstance) -> Self {
        Self::Bean(bean)
    }
}

impl From<Vec<DynValue>> for DynValue {
    fn from(items: Vec<DynValue>) -> Self {
        Self::List(items)
    }
}

/// 调用参数
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<DynValue>);

impl Args {
    /// 创建参数列表
    pub fn new(values: Vec<DynValue>) -> Self {
        Self(values)
    }

    /// 空参数
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// 参数数量
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 追加参数
    pub fn push(&mut self, value: DynValue) {
        self.0.push(value);
    }

    /// 按位置获取
    pub fn get(&self, index: usize) -> Option<&DynValue> {
        self.0.get(index)
    }

    /// 遍历
    pub fn iter(&self) -> impl Iterator<Item = &DynValue> {
        self.0.iter()
    }

    /// 转为列表
    pub fn into_vec(self) -> Vec<DynValue> {
        self.0
    }

    fn required(&self, index: usize) -> Result<&DynValue, BoxError> {
        self.0
            .get(index)
            .ok_or_else(|| format!("缺少第 {} 个参数", index).into())
    }

    /// 按位置获取 Bean 实例
    pub fn instance(&self, index: usize) -> Result<&BeanInstance, BoxError> {
        self.required(index)?
            .as_bean()
            .ok_or_else(|| format!("第 {} 个参数不是 Bean", index).into())
    }

    /// 按位置获取具体类型的对象
    pub fn bean<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, BoxError> {
        self.required(index)?.downcast::<T>().ok_or_else(|| {
            format!("第 {} 个参数不是 {}", index, std::any::type_name::<T>()).into()
        })
    }

    /// 按位置获取可选对象，空值返回 `None`
    pub fn optional_bean<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.0.get(index).and_then(DynValue::downcast::<T>)
    }

    /// 按位置获取类型视图
    pub fn view<U: ?Sized + 'static>(&self, index: usize) -> Result<Arc<U>, BoxError> {
        self.required(index)?.cast::<U>().ok_or_else(|| {
            format!("第 {} 个参数无法视为 {}", index, std::any::type_name::<U>()).into()
        })
    }

    /// 按位置获取类型视图集合，空值视为空集合
    pub fn views<U: ?Sized + 'static>(&self, index: usize) -> Result<Vec<Arc<U>>, BoxError> {
        let value = self.required(index)?;
        value
            .beans()
            .iter()
            .map(|bean| {
                bean.cast::<U>().ok_or_else(|| {
                    BoxError::from(format!(
                        "集合参数中的 {} 无法视为 {}",
                        bean.type_info(),
                        std::any::type_name::<U>()
                    ))
                })
            })
            .collect()
    }

    /// 按位置反序列化字面量
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> Result<T, BoxError> {
        self.required(index)?.to()
    }
}

impl From<Vec<DynValue>> for Args {
    fn from(values: Vec<DynValue>) -> Self {
        Self(values)
    }
}

impl FromIterator<DynValue> for Args {
    fn from_iter<I: IntoIterator<Item = DynValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
