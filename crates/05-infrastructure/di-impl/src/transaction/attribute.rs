//! 事务属性与属性源

use dashmap::DashMap;
use di_abstractions::{ComponentModel, Isolation, MethodInfo, Propagation, TransactionDefinition};
use infrastructure_common::{Annotation, TypeKey};
use serde::Deserialize;
use std::error::Error;
use std::sync::Arc;
use tracing::{error, trace};

/// 事务注解名称
pub const TRANSACTIONAL_ANNOTATION: &str = "transactional";

/// 回滚规则
///
/// `pattern` 与错误链中各层错误的显示文本做包含匹配，离最外层越近的匹配越具体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRule {
    pub pattern: String,
    pub rollback: bool,
}

impl RollbackRule {
    /// 匹配时回滚
    pub fn rollback_for(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            rollback: true,
        }
    }

    /// 匹配时仍然提交
    pub fn no_rollback_for(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            rollback: false,
        }
    }

    /// 第一个匹配的错误在错误链中的深度
    pub fn depth(&self, error: &(dyn Error + 'static)) -> Option<usize> {
        let mut current = Some(error);
        let mut depth = 0;
        while let Some(err) = current {
            if err.to_string().contains(&self.pattern) {
                return Some(depth);
            }
            current = err.source();
            depth += 1;
        }
        None
    }
}

/// 事务属性
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionAttribute {
    pub definition: TransactionDefinition,
    /// 事务管理器的 Bean 名称，未指定时使用唯一的事务管理器
    pub qualifier: Option<String>,
    pub rollback_rules: Vec<RollbackRule>,
}

impl TransactionAttribute {
    /// 出现该错误时是否回滚
    ///
    /// 最具体的规则决定结果，深度相同时先声明的规则优先；没有规则匹配时回滚
    pub fn rollback_on(&self, error: &(dyn Error + 'static)) -> bool {
        let mut winner: Option<(usize, &RollbackRule)> = None;
        for rule in &self.rollback_rules {
            if let Some(depth) = rule.depth(error) {
                if winner.map_or(true, |(best, _)| depth < best) {
                    winner = Some((depth, rule));
                }
            }
        }
        match winner {
            Some((_, rule)) => rule.rollback,
            None => true,
        }
    }
}

/// 事务注解属性
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransactionalAttributes {
    #[serde(alias = "value")]
    transaction_manager: Option<String>,
    propagation: Propagation,
    isolation: Isolation,
    timeout: Option<u64>,
    read_only: bool,
    rollback_for: Vec<String>,
    no_rollback_for: Vec<String>,
}

impl TransactionalAttributes {
    fn parse(annotation: &Annotation) -> Result<Self, serde_json::Error> {
        if annotation.attributes.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(annotation.attributes.clone())
    }

    fn into_attribute(self, name: String) -> TransactionAttribute {
        let rollback_rules = self
            .rollback_for
            .into_iter()
            .map(RollbackRule::rollback_for)
            .chain(self.no_rollback_for.into_iter().map(RollbackRule::no_rollback_for))
            .collect();
        TransactionAttribute {
            definition: TransactionDefinition {
                name,
                propagation: self.propagation,
                isolation: self.isolation,
                timeout_secs: self.timeout,
                read_only: self.read_only,
            },
            qualifier: self.transaction_manager,
            rollback_rules,
        }
    }
}

/// 事务属性源
pub trait TransactionAttributeSource: Send + Sync {
    /// 方法的事务属性，非事务方法返回 `None`
    fn attribute(&self, method: &MethodInfo, model: &dyn ComponentModel) -> Option<Arc<TransactionAttribute>>;
}

/// 从 `transactional` 注解读取事务属性：方法上的注解优先，其次是类上的注解
#[derive(Default)]
pub struct AnnotationTransactionAttributeSource {
    cache: DashMap<(TypeKey, String), Option<Arc<TransactionAttribute>>>,
}

impl AnnotationTransactionAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute(method: &MethodInfo, model: &dyn ComponentModel) -> Option<TransactionAttribute> {
        let annotation = method
            .annotations
            .find(TRANSACTIONAL_ANNOTATION)
            .or_else(|| model.annotations().find(TRANSACTIONAL_ANNOTATION))?;
        let name = format!("{}.{}", model.type_info().short_name(), method.name);
        match TransactionalAttributes::parse(annotation) {
            Ok(attributes) => Some(attributes.into_attribute(name)),
            Err(err) => {
                error!("方法 {} 的事务注解属性无效: {}", name, err);
                None
            }
        }
    }
}

impl TransactionAttributeSource for AnnotationTransactionAttributeSource {
    fn attribute(&self, method: &MethodInfo, model: &dyn ComponentModel) -> Option<Arc<TransactionAttribute>> {
        let key = (model.type_info().key, method.name.clone());
        if let Some(cached) = self.cache.get(&key) {
            return cached.value().clone();
        }
        let attribute = Self::compute(method, model).map(Arc::new);
        if let Some(attribute) = &attribute {
            trace!("方法 {} 的事务属性: {:?}", attribute.definition.name, attribute);
        }
        self.cache.entry(key).or_insert(attribute).value().clone()
    }
}
