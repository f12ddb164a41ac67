//! 容器内核
//!
//! 汇集注册表、作用域、事件总线与分发池，负责实例解析、依赖注入和事件分发。

use crate::dispatch::{panic_message, DispatchPool};
use crate::events::EventBus;
use crate::proxy::ContextualHandle;
use crate::registry::{Binding, BindingRegistry, BindingSource};
use crate::scope::ScopeManager;
use di_abstractions::{
    BeanClass, ContextResolver, Dependencies, Injected, InjectionPoint, InjectionPointBuilder,
    Instance, NameResolver, ObserverMethod, ResolveContext,
};
use infrastructure_common::{
    BoxError, DependencyError, DependencyResult, Key, Qualifier, TypeKey,
};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

pub(crate) struct Container {
    registry: BindingRegistry,
    scopes: ScopeManager,
    events: EventBus,
    dispatch: DispatchPool,
    builders: RwLock<HashMap<String, Arc<dyn InjectionPointBuilder>>>,
    classes: RwLock<Vec<BeanClass>>,
    max_depth: usize,
    weak: Weak<Container>,
}

impl Container {
    pub(crate) fn new(max_depth: usize, workers: usize, capacity: usize) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            registry: BindingRegistry::new(),
            scopes: ScopeManager::new(),
            events: EventBus::new(),
            dispatch: DispatchPool::new(workers, capacity),
            builders: RwLock::new(HashMap::new()),
            classes: RwLock::new(Vec::new()),
            max_depth,
            weak: weak.clone(),
        })
    }

    pub(crate) fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub(crate) fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    // ---- 注册 ----

    pub(crate) fn add_class(&self, class: BeanClass) {
        let type_key = class.type_key();
        let replaced = {
            let mut classes = self.classes.write();
            let replaced = classes
                .iter()
                .position(|existing| existing.type_key() == type_key)
                .map(|index| classes.remove(index));
            classes.push(class.clone());
            replaced.is_some()
        };

        if replaced {
            warn!("Bean 被重新注册，替换原有绑定与观察者: {}", type_key);
            self.forget_class(type_key);
        }

        let bindings = self.registry.add_class(&class);
        self.scopes.evict(type_key);
        if bindings.is_empty() && !class.observers().is_empty() {
            warn!(
                "类型 {} 不可实例化，忽略其 {} 个观察者方法",
                type_key,
                class.observers().len()
            );
        } else {
            self.events.add(class.observers().iter().cloned());
        }
        info!("注册 Bean: {} ({})", type_key, class.scope());
    }

    pub(crate) fn remove_class(&self, type_key: TypeKey) -> bool {
        let known = {
            let mut classes = self.classes.write();
            let before = classes.len();
            classes.retain(|class| class.type_key() != type_key);
            before != classes.len()
        };
        if known {
            self.forget_class(type_key);
            info!("移除 Bean: {}", type_key);
        }
        known
    }

    fn forget_class(&self, type_key: TypeKey) {
        let removed = self.registry.remove_class(type_key);
        debug!("移除 {} 个绑定: {}", removed.len(), type_key);
        self.scopes.evict(type_key);
        self.events.remove_declared_by(type_key);
    }

    pub(crate) fn bind(&self, key: Key, instance: Instance) {
        self.registry.bind_instance(key, instance);
    }

    pub(crate) fn unbind(&self, address: *const ()) -> usize {
        let removed = self.registry.unbind_instance(address);
        for binding in &removed {
            debug!("解除实例绑定: {}", binding.key());
        }
        removed.len()
    }

    pub(crate) fn add_observer(&self, observer: ObserverMethod) {
        self.events.add([observer]);
    }

    pub(crate) fn register_builder(&self, builder: Arc<dyn InjectionPointBuilder>) {
        let marker = builder.marker().to_string();
        if self
            .builders
            .write()
            .insert(marker.clone(), builder)
            .is_some()
        {
            warn!("注入点构建器被替换: {}", marker);
        } else {
            info!("注册注入点构建器: {}", marker);
        }
    }

    pub(crate) fn injection_points(&self) -> Vec<(TypeKey, InjectionPoint)> {
        self.classes
            .read()
            .iter()
            .flat_map(|class| {
                class
                    .injection_points()
                    .iter()
                    .map(move |point| (class.type_key(), point.clone()))
            })
            .collect()
    }

    // ---- 解析 ----

    pub(crate) fn resolve_binding(&self, key: &Key) -> DependencyResult<Arc<Binding>> {
        self.registry
            .resolve(key)
            .ok_or_else(|| DependencyError::Unresolved { key: key.clone() })
    }

    pub(crate) fn get(&self, key: &Key) -> DependencyResult<Instance> {
        let binding = self.resolve_binding(key)?;
        self.instance_for(&binding, &mut ResolveContext::new(self.max_depth))
    }

    pub(crate) fn find(&self, name: &str) -> DependencyResult<Option<Instance>> {
        match self.registry.find_by_name(name) {
            Some(binding) => self
                .instance_for(&binding, &mut ResolveContext::new(self.max_depth))
                .map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn proxy_for(&self, binding: Arc<Binding>) -> Arc<dyn ContextResolver> {
        Arc::new(ContextualHandle::new(binding, self.weak.clone()))
    }

    /// 在当前作用域上下文中获取或创建实例
    pub(crate) fn instance_for(
        &self,
        binding: &Arc<Binding>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        if let BindingSource::Instance(instance) = binding.source() {
            return Ok(Arc::clone(instance));
        }

        let Some(slot) = self.scopes.slot_for(binding)? else {
            return self.construct(binding, ctx);
        };
        if let Some(instance) = slot.get() {
            return Ok(Arc::clone(instance));
        }
        // 同一线程重入槽的初始化会死锁，必须先检查循环
        ctx.enter_shared(binding.origin(), binding.key())?;
        let result = slot
            .get_or_try_init(|| self.construct(binding, ctx))
            .map(Arc::clone);
        ctx.exit_shared();
        result
    }

    fn construct(
        &self,
        binding: &Arc<Binding>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        ctx.enter(binding.key())?;
        let result = self.construct_entered(binding, ctx);
        ctx.exit();
        result
    }

    fn construct_entered(
        &self,
        binding: &Arc<Binding>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        let BindingSource::Class {
            constructor,
            injection_points,
        } = binding.source()
        else {
            return Err(DependencyError::NotInstantiable {
                type_name: binding.origin().to_string(),
                reason: "直接绑定的实例不能被构造".to_string(),
            });
        };

        let deps = self.inject(binding.origin(), injection_points, ctx)?;
        debug!("创建实例: {} ({})", binding.key(), binding.scope());

        match catch_unwind(AssertUnwindSafe(|| constructor(&deps))) {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(source)) => Err(DependencyError::CreationFailed {
                key: binding.key().clone(),
                source,
            }),
            Err(payload) => Err(DependencyError::CreationFailed {
                key: binding.key().clone(),
                source: format!("构造器发生 panic: {}", panic_message(payload.as_ref())).into(),
            }),
        }
    }

    fn inject(
        &self,
        owner: TypeKey,
        points: &[InjectionPoint],
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Dependencies> {
        let mut deps = Dependencies::new(owner);
        for point in points {
            let value = self.injected_value(owner, point, ctx)?;
            deps.insert(point.field(), point.key().clone(), value);
        }
        Ok(deps)
    }

    fn injected_value(
        &self,
        owner: TypeKey,
        point: &InjectionPoint,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Injected> {
        if let Some(marker) = point.marker() {
            let builder = self.builders.read().get(marker.name()).cloned();
            let value = match builder {
                Some(builder) => builder.build(point).map_err(|source| {
                    DependencyError::CreationFailed {
                        key: point.key().clone(),
                        source,
                    }
                })?,
                None => {
                    debug!("没有处理标记 {} 的注入点构建器: {}.{}", marker.name(), owner, point.field());
                    None
                }
            };
            return match value {
                Some(instance) => Ok(Injected::Instance(instance)),
                None => self.absent(owner, point),
            };
        }

        match self.registry.resolve(point.key()) {
            None => self.absent(owner, point),
            Some(binding) if binding.scope().is_context_scoped() => {
                Ok(Injected::Proxy(self.proxy_for(binding)))
            }
            Some(binding) => self.instance_for(&binding, ctx).map(Injected::Instance),
        }
    }

    fn absent(&self, owner: TypeKey, point: &InjectionPoint) -> DependencyResult<Injected> {
        if point.is_required() {
            Err(DependencyError::RequiredDependencyMissing {
                owner: owner.to_string(),
                field: point.field().to_string(),
                key: point.key().clone(),
            })
        } else {
            Ok(Injected::Absent)
        }
    }

    // ---- 事件 ----

    pub(crate) fn observers_for(
        &self,
        event_type: TypeKey,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> Vec<ObserverMethod> {
        self.events.observers_for(event_type, qualifiers)
    }

    /// 分发事件：先把异步观察者提交到分发池，再按注册顺序在当前线程执行同步观察者
    pub(crate) fn fire(
        &self,
        event: Arc<dyn Any + Send + Sync>,
        event_type: TypeKey,
        qualifiers: &BTreeSet<Qualifier>,
    ) -> DependencyResult<()> {
        let observers = self.events.observers_for(event_type, qualifiers);
        if observers.is_empty() {
            debug!("事件没有观察者: {}", event_type);
            return Ok(());
        }

        let (asynchronous, synchronous): (Vec<_>, Vec<_>) =
            observers.into_iter().partition(ObserverMethod::is_async);

        for observer in asynchronous {
            let weak = self.weak.clone();
            let event = Arc::clone(&event);
            self.dispatch.submit(Box::new(move || {
                let Some(container) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = container.notify(&observer, event.as_ref()) {
                    error!(
                        "异步观察者执行失败: 事件 {}, 原因: {}",
                        observer.event_type(),
                        e
                    );
                }
            }))?;
        }

        for observer in synchronous {
            self.notify(&observer, event.as_ref())
                .map_err(|source| DependencyError::ObserverFailed {
                    event: event_type.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    fn notify(
        &self,
        observer: &ObserverMethod,
        event: &(dyn Any + Send + Sync),
    ) -> Result<(), BoxError> {
        match observer.declaring() {
            Some(key) => {
                let bean = self.get(key)?;
                observer.notify(Some(&bean), event)
            }
            None => observer.notify(None, event),
        }
    }

    // ---- 生命周期 ----

    pub(crate) fn shutdown(&self) {
        self.dispatch.shutdown();
        self.scopes.clear();
    }
}

impl NameResolver for Container {
    fn resolve_name(&self, name: &str) -> Option<Instance> {
        match self.find(name) {
            Ok(instance) => instance,
            Err(e) => {
                warn!("按名称解析失败: {}, 原因: {}", name, e);
                None
            }
        }
    }
}
