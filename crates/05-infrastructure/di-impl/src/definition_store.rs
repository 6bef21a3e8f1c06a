//! 内存中的 Bean 定义存储与别名登记

use dashmap::DashMap;
use di_abstractions::BeanDefinition;
use infrastructure_common::{BeanError, BeanResult};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Bean 定义存储
pub struct DefinitionStore {
    definitions: DashMap<String, Arc<BeanDefinition>>,
    names: RwLock<Vec<String>>,
    aliases: RwLock<HashMap<String, String>>,
    merged: DashMap<String, Arc<BeanDefinition>>,
    allow_overriding: bool,
}

impl DefinitionStore {
    /// 创建存储
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            definitions: DashMap::new(),
            names: RwLock::new(Vec::new()),
            aliases: RwLock::new(HashMap::new()),
            merged: DashMap::new(),
            allow_overriding,
        }
    }

    /// 注册定义；返回是否替换了已有定义
    pub fn register(&self, name: &str, definition: BeanDefinition) -> BeanResult<bool> {
        if name.is_empty() {
            return Err(BeanError::DefinitionStore {
                bean_name: name.to_string(),
                message: "名称不能为空".to_string(),
            });
        }
        Self::validate(name, &definition)?;

        let existing = self.definitions.contains_key(name);
        if existing && !self.allow_overriding {
            return Err(BeanError::DefinitionStore {
                bean_name: name.to_string(),
                message: "同名定义已存在且不允许覆盖".to_string(),
            });
        }
        if self.aliases.read().contains_key(name) {
            if !self.allow_overriding {
                return Err(BeanError::DefinitionStore {
                    bean_name: name.to_string(),
                    message: "名称已被用作别名".to_string(),
                });
            }
            self.aliases.write().remove(name);
        }

        self.definitions.insert(name.to_string(), Arc::new(definition));
        if existing {
            info!("覆盖 Bean 定义: {}", name);
        } else {
            self.names.write().push(name.to_string());
            debug!("注册 Bean 定义: {}", name);
        }
        Ok(existing)
    }

    fn validate(name: &str, definition: &BeanDefinition) -> BeanResult<()> {
        let has_source = definition.class.is_some()
            || definition.parent.is_some()
            || definition.factory_bean_name.is_some()
            || definition.instance_supplier.is_some();
        if !definition.is_abstract && !has_source {
            return Err(BeanError::DefinitionStore {
                bean_name: name.to_string(),
                message: "缺少组件模型、父定义、工厂 Bean 或实例提供者".to_string(),
            });
        }
        if definition.factory_bean_name.is_some() && definition.factory_method_name.is_none() {
            return Err(BeanError::DefinitionStore {
                bean_name: name.to_string(),
                message: "指定了工厂 Bean 但没有工厂方法".to_string(),
            });
        }
        Ok(())
    }

    /// 移除定义
    pub fn remove(&self, name: &str) -> BeanResult<()> {
        if self.definitions.remove(name).is_none() {
            return Err(BeanError::no_such_bean(name));
        }
        self.names.write().retain(|existing| existing != name);
        self.merged.remove(name);
        Ok(())
    }

    /// 原始定义
    pub fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.definitions.get(name).map(|entry| entry.value().clone())
    }

    /// 是否包含定义
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// 定义名称，按注册顺序
    pub fn names(&self) -> Vec<String> {
        self.names.read().clone()
    }

    /// 定义数量
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 直接以指定定义为父定义的子定义名称（父名称可以是别名）
    pub fn children_of(&self, parent: &str) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|name| {
                self.get(name).map_or(false, |definition| {
                    definition
                        .parent
                        .as_deref()
                        .map_or(false, |declared| self.canonical_name(declared) == parent)
                })
            })
            .collect()
    }

    /// 清除合并定义缓存
    pub fn clear_merged(&self, name: &str) {
        self.merged.remove(name);
    }

    /// 合并后的定义，结果被缓存
    pub fn merged(&self, name: &str) -> BeanResult<Arc<BeanDefinition>> {
        let mut visiting = HashSet::new();
        self.merged_inner(name, &mut visiting)
    }

    fn merged_inner(&self, name: &str, visiting: &mut HashSet<String>) -> BeanResult<Arc<BeanDefinition>> {
        if let Some(cached) = self.merged.get(name).map(|entry| entry.value().clone()) {
            return Ok(cached);
        }
        let raw = self.get(name).ok_or_else(|| BeanError::no_such_bean(name))?;
        if !visiting.insert(name.to_string()) {
            return Err(BeanError::DefinitionStore {
                bean_name: name.to_string(),
                message: "父定义链存在循环".to_string(),
            });
        }

        let merged = match &raw.parent {
            Some(parent) => {
                let parent_name = self.canonical_name(parent);
                if parent_name == name {
                    return Err(BeanError::DefinitionStore {
                        bean_name: name.to_string(),
                        message: "父定义不能是自身".to_string(),
                    });
                }
                let parent_definition = self.merged_inner(&parent_name, visiting).map_err(|err| {
                    BeanError::DefinitionStore {
                        bean_name: name.to_string(),
                        message: format!("无法合并父定义 '{}': {}", parent_name, err),
                    }
                })?;
                raw.merge_with_parent(&parent_definition)
            }
            None => (*raw).clone(),
        };

        let merged = Arc::new(merged);
        Ok(self
            .merged
            .entry(name.to_string())
            .or_insert(merged)
            .value()
            .clone())
    }

    /// 注册别名
    pub fn register_alias(&self, name: &str, alias: &str) -> BeanResult<()> {
        let mut aliases = self.aliases.write();
        if alias == name {
            aliases.remove(alias);
            return Ok(());
        }
        if let Some(existing) = aliases.get(alias) {
            if existing == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(BeanError::DefinitionStore {
                    bean_name: alias.to_string(),
                    message: format!("别名已指向 '{}'，不允许覆盖", existing),
                });
            }
        }
        if Self::resolves_to(&aliases, name, alias) {
            return Err(BeanError::DefinitionStore {
                bean_name: alias.to_string(),
                message: format!("别名 '{}' 与 '{}' 之间存在循环", alias, name),
            });
        }
        aliases.insert(alias.to_string(), name.to_string());
        debug!("注册别名: {} -> {}", alias, name);
        Ok(())
    }

    fn resolves_to(aliases: &HashMap<String, String>, start: &str, target: &str) -> bool {
        let mut current = start;
        let mut seen = HashSet::new();
        while let Some(next) = aliases.get(current) {
            if next == target {
                return true;
            }
            if !seen.insert(next.as_str()) {
                return false;
            }
            current = next;
        }
        false
    }

    /// 移除别名
    pub fn remove_alias(&self, alias: &str) -> BeanResult<()> {
        match self.aliases.write().remove(alias) {
            Some(_) => Ok(()),
            None => Err(BeanError::DefinitionStore {
                bean_name: alias.to_string(),
                message: "别名未注册".to_string(),
            }),
        }
    }

    /// 沿别名链解析规范名称
    pub fn canonical_name(&self, name: &str) -> String {
        let aliases = self.aliases.read();
        let mut current = name;
        let mut seen = HashSet::new();
        while let Some(next) = aliases.get(current) {
            if !seen.insert(next.as_str()) {
                break;
            }
            current = next;
        }
        current.to_string()
    }

    /// 指向指定名称的全部别名（含间接别名）
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let aliases = self.aliases.read();
        let mut result: Vec<String> = aliases
            .iter()
            .filter(|(alias, _)| alias.as_str() != name && Self::resolves_to(&aliases, alias, name))
            .map(|(alias, _)| alias.clone())
            .collect();
        result.sort();
        result
    }
}
