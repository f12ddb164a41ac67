//! 事件总线
//!
//! 观察者列表采用写时复制，分发时遍历快照，注册与分发互不阻塞。

use di_abstractions::ObserverMethod;
use infrastructure_common::{Qualifier, TypeKey};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// 事件总线
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Arc<Vec<ObserverMethod>>>,
}

impl EventBus {
    /// 创建事件总线
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册观察者，保持注册顺序
    pub fn add(&self, observers: impl IntoIterator<Item = ObserverMethod>) {
        let observers: Vec<ObserverMethod> = observers.into_iter().collect();
        if observers.is_empty() {
            return;
        }
        let mut guard = self.observers.write();
        let mut next = Vec::clone(&guard);
        for observer in observers {
            debug!(
                "注册观察者: 事件 {} ({})",
                observer.event_type(),
                if observer.is_async() { "异步" } else { "同步" }
            );
            next.push(observer);
        }
        *guard = Arc::new(next);
    }

    /// 移除由指定类型声明的观察者，返回移除数量
    pub fn remove_declared_by(&self, type_key: TypeKey) -> usize {
        let mut guard = self.observers.write();
        let next: Vec<ObserverMethod> = guard
            .iter()
            .filter(|observer| {
                observer
                    .declaring()
                    .map_or(true, |key| key.type_key() != type_key)
            })
            .cloned()
            .collect();
        let removed = guard.len() - next.len();
        *guard = Arc::new(next);
        removed
    }

    /// 按注册顺序返回匹配事件类型与限定符集合的观察者
    pub fn observers_for(
        &self,
        event_type: TypeKey,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> Vec<ObserverMethod> {
        let snapshot = Arc::clone(&self.observers.read());
        snapshot
            .iter()
            .filter(|observer| observer.matches(event_type, qualifiers))
            .cloned()
            .collect()
    }

    /// 观察者总数
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// 是否没有观察者
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}
