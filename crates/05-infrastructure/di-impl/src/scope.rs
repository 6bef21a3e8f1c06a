//! 基于映射表的自定义作用域

use chrono::{DateTime, Utc};
use di_abstractions::{BeanInstance, Scope};
use infrastructure_common::BeanResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

type DestructionCallback = Box<dyn FnOnce() + Send + Sync>;

/// 映射表作用域
///
/// 作用域内每个名称只创建一次，直到 [`MapScope::reset`] 把对象连同销毁回调
/// 一起清除。适合会话、租户等由调用方控制边界的场景。
pub struct MapScope {
    name: String,
    id: Mutex<Uuid>,
    created_at: Mutex<DateTime<Utc>>,
    objects: Mutex<HashMap<String, BeanInstance>>,
    callbacks: Mutex<Vec<(String, DestructionCallback)>>,
}

impl MapScope {
    /// 创建作用域
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Mutex::new(Uuid::new_v4()),
            created_at: Mutex::new(Utc::now()),
            objects: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前会话开始时间
    pub fn created_at(&self) -> DateTime<Utc> {
        *self.created_at.lock()
    }

    /// 作用域内的对象数量
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// 结束当前会话：按登记的逆序执行销毁回调，清除全部对象并开始新会话
    pub fn reset(&self) {
        let callbacks: Vec<(String, DestructionCallback)> = std::mem::take(&mut *self.callbacks.lock());
        let count = self.objects.lock().len();
        for (name, callback) in callbacks.into_iter().rev() {
            debug!("销毁作用域 '{}' 中的对象: {}", self.name, name);
            callback();
        }
        self.objects.lock().clear();
        *self.id.lock() = Uuid::new_v4();
        *self.created_at.lock() = Utc::now();
        info!("作用域 '{}' 已重置, 清除对象数量: {}", self.name, count);
    }
}

impl Scope for MapScope {
    fn get(
        &self,
        name: &str,
        factory: &mut dyn FnMut() -> BeanResult<BeanInstance>,
    ) -> BeanResult<BeanInstance> {
        if let Some(existing) = self.objects.lock().get(name) {
            return Ok(existing.clone());
        }
        // 创建过程可能再次进入作用域，不能持锁
        let created = factory()?;
        let mut objects = self.objects.lock();
        Ok(objects.entry(name.to_string()).or_insert(created).clone())
    }

    fn remove(&self, name: &str) -> Option<BeanInstance> {
        let removed = self.objects.lock().remove(name);
        self.callbacks.lock().retain(|(registered, _)| registered != name);
        removed
    }

    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send + Sync>) {
        let mut callbacks = self.callbacks.lock();
        callbacks.retain(|(registered, _)| registered != name);
        callbacks.push((name.to_string(), callback));
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.id.lock().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_model::BeanClass;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Cart;

    fn cart() -> BeanInstance {
        BeanInstance::of(Cart, BeanClass::<Cart>::builder().build())
    }

    #[test]
    fn test_object_created_once_per_conversation() {
        let scope = MapScope::new("session");
        let created = AtomicUsize::new(0);
        let mut factory = || {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(cart())
        };

        let first = scope.get("cart", &mut factory).unwrap();
        let second = scope.get("cart", &mut factory).unwrap();
        assert!(first.same_instance(&second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_runs_callbacks_and_starts_new_conversation() {
        let scope = MapScope::new("session");
        let destroyed = Arc::new(AtomicUsize::new(0));
        scope.get("cart", &mut || Ok(cart())).unwrap();
        let counter = destroyed.clone();
        scope.register_destruction_callback(
            "cart",
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let before = scope.conversation_id();

        scope.reset();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(scope.is_empty());
        assert_ne!(before, scope.conversation_id());
    }
}
