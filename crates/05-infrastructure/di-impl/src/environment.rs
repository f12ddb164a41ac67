//! 运行时环境
//!
//! [`Environment`] 是对外的唯一入口：注册 Bean、绑定实例、解析依赖、
//! 分发事件以及驱动扩展生命周期。所有运行时状态都归属于某个 Environment，
//! 进程级共享的只有发现目录和运行时标识。

use crate::container::Container;
use crate::extension::{Extension, EXTENSION_CATALOG};
use crate::manifest::ClassManifest;
use di_abstractions::{
    BeanClass, Contextual, Injectable, InjectionPoint, InjectionPointBuilder, Instance,
    NameResolver, ObserverMethod, SessionIdProvider, DEFAULT_MAX_RESOLUTION_DEPTH,
};
use infrastructure_common::{
    runtime_identity, BoxError, DependencyError, DependencyResult, InfrastructureError,
    InfrastructureResult, Key, LifecycleState, Qualifier, TypeKey,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 运行时配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 异步观察者工作线程数量
    pub async_workers: usize,
    /// 异步分发队列容量
    pub async_queue_capacity: usize,
    /// 启动时是否加载发现目录中的扩展
    pub discover_extensions: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            async_workers: 4,
            async_queue_capacity: 1024,
            discover_extensions: true,
        }
    }
}

impl EnvironmentConfig {
    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 设置异步工作线程数量
    pub fn with_async_workers(mut self, workers: usize) -> Self {
        self.async_workers = workers;
        self
    }

    /// 设置异步分发队列容量
    pub fn with_async_queue_capacity(mut self, capacity: usize) -> Self {
        self.async_queue_capacity = capacity;
        self
    }

    /// 设置是否加载发现目录中的扩展
    pub fn with_discover_extensions(mut self, discover: bool) -> Self {
        self.discover_extensions = discover;
        self
    }
}

/// 运行时环境
pub struct Environment {
    container: Arc<Container>,
    config: EnvironmentConfig,
    extensions: RwLock<Vec<Arc<dyn Extension>>>,
    started: Mutex<Vec<Arc<dyn Extension>>>,
    manifests: RwLock<Vec<ClassManifest>>,
    state: RwLock<LifecycleState>,
}

impl Environment {
    /// 使用默认配置创建环境
    pub fn new() -> Self {
        Self::with_config(EnvironmentConfig::default())
    }

    /// 使用指定配置创建环境
    pub fn with_config(config: EnvironmentConfig) -> Self {
        let container = Container::new(
            config.max_resolution_depth,
            config.async_workers,
            config.async_queue_capacity,
        );
        Self {
            container,
            config,
            extensions: RwLock::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            manifests: RwLock::new(Vec::new()),
            state: RwLock::new(LifecycleState::Uninitialized),
        }
    }

    /// 运行时配置
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// 进程级运行时标识
    pub fn identity(&self) -> &'static str {
        runtime_identity()
    }

    /// 当前生命周期状态
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    // ---- 注册 ----

    /// 注册 Bean，返回实际注册的数量
    pub fn add(&self, classes: impl IntoIterator<Item = BeanClass>) -> usize {
        let mut added = 0;
        for class in classes {
            if class.type_key().is::<Environment>() {
                debug!("跳过运行时自身类型: {}", class.type_key());
                continue;
            }
            self.container.add_class(class);
            added += 1;
        }
        added
    }

    /// 注册自描述的 Bean 类型
    pub fn add_class<T: Injectable>(&self) -> usize {
        self.add([T::bean_class()])
    }

    /// 移除 Bean 及其绑定和观察者，返回实际移除的数量
    pub fn remove(&self, types: impl IntoIterator<Item = TypeKey>) -> usize {
        types
            .into_iter()
            .filter(|type_key| self.container.remove_class(*type_key))
            .count()
    }

    /// 移除 Bean 类型
    pub fn remove_class<T: Any>(&self) -> bool {
        self.remove([TypeKey::of::<T>()]) == 1
    }

    /// 以默认绑定键绑定实例
    pub fn bind<T: Any + Send + Sync>(&self, value: T) -> Arc<T> {
        self.bind_arc(Arc::new(value))
    }

    /// 以默认绑定键绑定共享实例
    pub fn bind_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Arc<T> {
        self.bind_qualified(value, std::iter::empty())
    }

    /// 以带限定符的绑定键绑定共享实例
    pub fn bind_qualified<T: Any + Send + Sync>(
        &self,
        value: Arc<T>,
        qualifiers: impl IntoIterator<Item = Qualifier>,
    ) -> Arc<T> {
        let instance: Instance = Arc::clone(&value) as Instance;
        self.container.bind(Key::qualified::<T>(qualifiers), instance);
        value
    }

    /// 解除实例的全部绑定
    pub fn unbind<T: Any + Send + Sync>(&self, instance: &Arc<T>) -> bool {
        self.container.unbind(Arc::as_ptr(instance).cast::<()>()) > 0
    }

    /// 注册自由函数同步观察者
    pub fn observe<E, F>(&self, qualifiers: impl IntoIterator<Item = Qualifier>, f: F)
    where
        E: Any + Send + Sync,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.container
            .add_observer(ObserverMethod::function::<E, F>(qualifiers, false, f));
    }

    /// 注册自由函数异步观察者
    pub fn observe_async<E, F>(&self, qualifiers: impl IntoIterator<Item = Qualifier>, f: F)
    where
        E: Any + Send + Sync,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.container
            .add_observer(ObserverMethod::function::<E, F>(qualifiers, true, f));
    }

    /// 注册注入点构建器
    pub fn register_injection_point_builder(&self, builder: Arc<dyn InjectionPointBuilder>) {
        self.container.register_builder(builder);
    }

    /// 已注册 Bean 的全部注入点
    pub fn injection_points(&self) -> Vec<(TypeKey, InjectionPoint)> {
        self.container.injection_points()
    }

    /// 添加扩展，在下次启动时生效
    pub fn add_extension(&self, extension: Arc<dyn Extension>) {
        self.extensions.write().push(extension);
    }

    /// 添加 Bean 清单，在下次启动时解析
    pub fn add_manifest(&self, manifest: ClassManifest) {
        self.manifests.write().push(manifest);
    }

    // ---- 解析 ----

    /// 解析默认绑定
    pub fn get<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        self.get_qualified::<T>(std::iter::empty())
    }

    /// 解析带限定符的绑定
    pub fn get_qualified<T: Any + Send + Sync>(
        &self,
        qualifiers: impl IntoIterator<Item = Qualifier>,
    ) -> DependencyResult<Arc<T>> {
        let key = Key::qualified::<T>(qualifiers);
        let instance = self.container.get(&key)?;
        downcast(instance, &key)
    }

    /// 按绑定键解析
    pub fn get_by_key(&self, key: &Key) -> DependencyResult<Instance> {
        self.container.get(key)
    }

    /// 解析默认绑定，未注册时返回 `None`
    pub fn try_get<T: Any + Send + Sync>(&self) -> DependencyResult<Option<Arc<T>>> {
        match self.get::<T>() {
            Ok(instance) => Ok(Some(instance)),
            Err(DependencyError::Unresolved { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 按 Bean 名称查找实例
    pub fn find(&self, name: &str) -> DependencyResult<Option<Instance>> {
        self.container.find(name)
    }

    /// 按 Bean 名称查找并转换为指定类型
    pub fn find_as<T: Any + Send + Sync>(&self, name: &str) -> DependencyResult<Option<Arc<T>>> {
        match self.container.registry().find_by_name(name) {
            Some(binding) => {
                let key = binding.key().clone();
                let instance = self.container.get(&key)?;
                downcast(instance, &key).map(Some)
            }
            None => Ok(None),
        }
    }

    /// 获取请求/会话作用域绑定的上下文代理
    pub fn contextual<T: Any + Send + Sync>(
        &self,
        qualifiers: impl IntoIterator<Item = Qualifier>,
    ) -> DependencyResult<Contextual<T>> {
        let key = Key::qualified::<T>(qualifiers);
        let binding = self.container.resolve_binding(&key)?;
        if !binding.scope().is_context_scoped() {
            return Err(DependencyError::ScopeMismatch {
                expected: "request|session".to_string(),
                actual: binding.scope().to_string(),
            });
        }
        Ok(Contextual::new(self.container.proxy_for(binding)))
    }

    /// 注入该绑定时得到的是否为可变目标的代理
    ///
    /// 请求/会话作用域返回 `true`，其余作用域返回 `false`。
    pub fn is_mutable(&self, key: &Key) -> DependencyResult<bool> {
        let binding = self.container.resolve_binding(key)?;
        Ok(binding.scope().is_context_scoped())
    }

    /// 名称解析器视图，供外部表达式层使用
    pub fn name_resolver(&self) -> Arc<dyn NameResolver> {
        Arc::clone(&self.container) as Arc<dyn NameResolver>
    }

    // ---- 事件 ----

    /// 分发无限定符事件
    pub fn fire<E: Any + Send + Sync>(&self, event: E) -> DependencyResult<()> {
        self.fire_qualified(event, std::iter::empty())
    }

    /// 分发带限定符事件
    pub fn fire_qualified<E: Any + Send + Sync>(
        &self,
        event: E,
        qualifiers: impl IntoIterator<Item = Qualifier>,
    ) -> DependencyResult<()> {
        let qualifiers: BTreeSet<Qualifier> = qualifiers.into_iter().collect();
        self.container
            .fire(Arc::new(event), TypeKey::of::<E>(), &qualifiers)
    }

    /// 按注册顺序返回匹配的观察者
    pub fn observers_for<E: Any>(
        &self,
        qualifiers: impl IntoIterator<Item = Qualifier>,
    ) -> Vec<ObserverMethod> {
        let qualifiers: BTreeSet<Qualifier> = qualifiers.into_iter().collect();
        self.container
            .observers_for(TypeKey::of::<E>(), &qualifiers)
    }

    // ---- 上下文 ----

    /// 开始请求上下文并激活到当前线程，守卫释放时结束请求
    pub fn begin_request(&self) -> RequestScope {
        let (id, previous) = self.container.scopes().begin_request();
        RequestScope {
            container: Arc::clone(&self.container),
            id,
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// 把当前线程关联到会话，守卫释放时解除关联（不销毁会话）
    pub fn associate_session(&self, id: impl Into<String>) -> SessionScope {
        let id = id.into();
        let previous = self.container.scopes().associate_session(id.clone());
        SessionScope {
            container: Arc::clone(&self.container),
            id,
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// 销毁会话上下文
    pub fn destroy_session(&self, id: &str) -> bool {
        self.container.scopes().destroy_session(id)
    }

    /// 设置外部会话标识提供者
    pub fn set_session_provider(&self, provider: Arc<dyn SessionIdProvider>) {
        self.container.scopes().set_session_provider(provider);
    }

    // ---- 生命周期 ----

    /// 启动环境：加载扩展、解析清单并按顺序启动扩展
    pub fn start(&self) -> InfrastructureResult<()> {
        {
            let mut state = self.state.write();
            if !state.can_start() {
                return Err(InfrastructureError::BootstrapFailed {
                    message: format!("当前状态 {:?} 无法启动", *state),
                });
            }
            *state = LifecycleState::Starting;
        }
        info!("启动运行时: {}", self.identity());

        let mut extensions: Vec<Arc<dyn Extension>> = Vec::new();
        if self.config.discover_extensions {
            for entry in EXTENSION_CATALOG.entries() {
                debug!("发现扩展: {}", entry.name);
                extensions.push((entry.provider)());
            }
        }
        extensions.extend(self.extensions.read().iter().cloned());

        let manifests = self.manifests.read().clone();
        for manifest in &manifests {
            let added = self.add(manifest.resolve());
            info!("清单 {} 注册了 {} 个 Bean", manifest.source(), added);
        }

        for extension in extensions {
            info!("启动扩展: {}", extension.name());
            if let Err(source) = extension.do_start(self) {
                error!("扩展启动失败: {}, 原因: {}", extension.name(), source);
                let name = extension.name().to_string();
                self.stop_extensions();
                *self.state.write() = LifecycleState::Error;
                return Err(InfrastructureError::ExtensionFailed { name, source });
            }
            self.started.lock().push(extension);
        }

        *self.state.write() = LifecycleState::Running;
        info!("运行时启动完成");
        Ok(())
    }

    /// 停止环境：按相反顺序停止扩展，清空作用域上下文并关闭分发池
    pub fn stop(&self) -> InfrastructureResult<()> {
        {
            let mut state = self.state.write();
            if !state.can_stop() {
                return Err(InfrastructureError::ShutdownFailed {
                    message: format!("当前状态 {:?} 无法停止", *state),
                });
            }
            *state = LifecycleState::Stopping;
        }
        info!("停止运行时: {}", self.identity());

        let failures = self.stop_extensions();
        self.container.shutdown();
        *self.state.write() = LifecycleState::Stopped;

        if failures.is_empty() {
            info!("运行时已停止");
            Ok(())
        } else {
            Err(InfrastructureError::ShutdownFailed {
                message: failures.join("; "),
            })
        }
    }

    fn stop_extensions(&self) -> Vec<String> {
        let started = std::mem::take(&mut *self.started.lock());
        let mut failures = Vec::new();
        for extension in started.iter().rev() {
            debug!("停止扩展: {}", extension.name());
            if let Err(e) = extension.do_stop(self) {
                warn!("扩展停止失败: {}, 原因: {}", extension.name(), e);
                failures.push(format!("{}: {}", extension.name(), e));
            }
        }
        failures
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("identity", &self.identity())
            .field("state", &self.state())
            .field("bindings", &self.container.registry().len())
            .field("observers", &self.container.events().len())
            .finish()
    }
}

/// 请求上下文守卫
///
/// 只能在创建它的线程上使用，释放时销毁请求内的实例并恢复之前的请求。
pub struct RequestScope {
    container: Arc<Container>,
    id: Uuid,
    previous: Option<Uuid>,
    _thread_bound: PhantomData<*const ()>,
}

impl RequestScope {
    /// 请求标识
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.container.scopes().end_request(self.id, self.previous);
    }
}

/// 会话关联守卫
pub struct SessionScope {
    container: Arc<Container>,
    id: String,
    previous: Option<String>,
    _thread_bound: PhantomData<*const ()>,
}

impl SessionScope {
    /// 会话标识
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.container
            .scopes()
            .dissociate_session(self.previous.take());
    }
}

fn downcast<T: Any + Send + Sync>(instance: Instance, key: &Key) -> DependencyResult<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| DependencyError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            key: key.clone(),
        })
}
