//! 绑定注册表
//!
//! 写时复制：读者克隆当前表的 `Arc`，互不阻塞且不会看到半成品；
//! 写者基于当前表构建新表后整体替换。

use di_abstractions::{BeanClass, Constructor, InjectionPoint, Instance};
use infrastructure_common::{Key, ScopeKind, TypeKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 绑定来源
#[derive(Clone)]
pub enum BindingSource {
    /// 由 Bean 元数据构造
    Class {
        /// 构造器
        constructor: Constructor,
        /// 注入点
        injection_points: Arc<Vec<InjectionPoint>>,
    },
    /// 直接绑定的实例
    Instance(Instance),
}

/// 绑定
#[derive(Clone)]
pub struct Binding {
    key: Key,
    scope: ScopeKind,
    origin: TypeKey,
    name: Option<String>,
    source: BindingSource,
}

impl Binding {
    /// 绑定键
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// 作用域
    pub fn scope(&self) -> ScopeKind {
        self.scope
    }

    /// 声明该绑定的类型
    pub fn origin(&self) -> TypeKey {
        self.origin
    }

    /// Bean 名称
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 绑定来源
    pub fn source(&self) -> &BindingSource {
        &self.source
    }

    /// 是否为直接绑定的实例
    pub fn is_instance(&self) -> bool {
        matches!(self.source, BindingSource::Instance(_))
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("origin", &self.origin)
            .field("name", &self.name)
            .field("instance", &self.is_instance())
            .finish()
    }
}

#[derive(Clone, Default)]
struct BindingTable {
    bindings: HashMap<Key, Arc<Binding>>,
    names: HashMap<String, Key>,
}

impl BindingTable {
    fn insert(&mut self, binding: Binding) -> Arc<Binding> {
        let binding = Arc::new(binding);
        if let Some(previous) = self
            .bindings
            .insert(binding.key().clone(), Arc::clone(&binding))
        {
            warn!(
                "绑定被替换: {} (原声明 {}, 新声明 {})",
                binding.key(),
                previous.origin(),
                binding.origin()
            );
            if let Some(name) = previous.name() {
                self.repoint_name(name, binding.key());
            }
        }
        if let Some(name) = binding.name() {
            self.names.insert(name.to_string(), binding.key().clone());
        }
        binding
    }

    // 名称指向被替换的键时，改指向同名的其他绑定，没有则移除
    fn repoint_name(&mut self, name: &str, replaced: &Key) {
        if self.names.get(name) != Some(replaced) {
            return;
        }
        let other = self
            .bindings
            .values()
            .find(|binding| binding.name() == Some(name))
            .map(|binding| binding.key().clone());
        match other {
            Some(key) => self.names.insert(name.to_string(), key),
            None => self.names.remove(name),
        };
    }

    fn remove_where(&mut self, predicate: impl Fn(&Binding) -> bool) -> Vec<Arc<Binding>> {
        let keys: Vec<Key> = self
            .bindings
            .iter()
            .filter(|(_, binding)| predicate(binding))
            .map(|(key, _)| key.clone())
            .collect();

        let removed: Vec<Arc<Binding>> = keys
            .iter()
            .filter_map(|key| self.bindings.remove(key))
            .collect();
        self.names.retain(|_, key| !keys.contains(key));
        removed
    }
}

/// 绑定注册表
#[derive(Default)]
pub struct BindingRegistry {
    table: RwLock<Arc<BindingTable>>,
}

impl BindingRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<BindingTable> {
        Arc::clone(&self.table.read())
    }

    fn update<R>(&self, f: impl FnOnce(&mut BindingTable) -> R) -> R {
        let mut guard = self.table.write();
        let mut next = BindingTable::clone(&guard);
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }

    /// 为 Bean 的每个限定符组合注册一个绑定
    ///
    /// 不可实例化的 Bean 不产生绑定。
    pub fn add_class(&self, class: &BeanClass) -> Vec<Arc<Binding>> {
        let Some(constructor) = class.constructor() else {
            debug!("跳过不可实例化的类型: {}", class.type_key());
            return Vec::new();
        };

        let bindings: Vec<Binding> = class
            .keys()
            .into_iter()
            .map(|key| Binding {
                key,
                scope: class.scope(),
                origin: class.type_key(),
                name: class.name().map(str::to_string),
                source: BindingSource::Class {
                    constructor: Arc::clone(constructor),
                    injection_points: Arc::clone(class.injection_points()),
                },
            })
            .collect();

        self.update(|table| {
            bindings
                .into_iter()
                .map(|binding| {
                    debug!("注册绑定: {} ({})", binding.key(), binding.scope());
                    table.insert(binding)
                })
                .collect()
        })
    }

    /// 移除由指定类型声明的全部绑定（直接绑定的实例除外）
    pub fn remove_class(&self, type_key: TypeKey) -> Vec<Arc<Binding>> {
        self.update(|table| {
            table.remove_where(|binding| binding.origin() == type_key && !binding.is_instance())
        })
    }

    /// 直接绑定实例
    pub fn bind_instance(&self, key: Key, instance: Instance) -> Arc<Binding> {
        let binding = Binding {
            origin: key.type_key(),
            key,
            scope: ScopeKind::Singleton,
            name: None,
            source: BindingSource::Instance(instance),
        };
        debug!("绑定实例: {}", binding.key());
        self.update(|table| table.insert(binding))
    }

    /// 解除某个实例的全部绑定，按实例地址比较
    pub fn unbind_instance(&self, address: *const ()) -> Vec<Arc<Binding>> {
        self.update(|table| {
            table.remove_where(|binding| match binding.source() {
                BindingSource::Instance(instance) => {
                    Arc::as_ptr(instance).cast::<()>() == address
                }
                BindingSource::Class { .. } => false,
            })
        })
    }

    /// 按绑定键精确查找
    pub fn resolve(&self, key: &Key) -> Option<Arc<Binding>> {
        self.snapshot().bindings.get(key).cloned()
    }

    /// 按 Bean 名称查找
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Binding>> {
        let table = self.snapshot();
        table
            .names
            .get(name)
            .and_then(|key| table.bindings.get(key))
            .cloned()
    }

    /// 已注册的全部绑定键
    pub fn keys(&self) -> Vec<Key> {
        self.snapshot().bindings.keys().cloned().collect()
    }

    /// 绑定数量
    pub fn len(&self) -> usize {
        self.snapshot().bindings.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.snapshot().bindings.is_empty()
    }
}
