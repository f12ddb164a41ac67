//! 作用域管理
//!
//! 每种作用域维护 `上下文标识 -> (声明类型 -> 实例槽)` 的映射。
//! 同一 Bean 以多个限定符组合注册时，各绑定共享同一个实例槽。
//! 实例槽是 `OnceCell`，首个调用者负责构造，并发调用者阻塞等待后共享结果；
//! 构造失败时槽保持为空，后续调用可以重试。

use crate::registry::Binding;
use dashmap::DashMap;
use di_abstractions::{Instance, SessionIdProvider};
use infrastructure_common::{DependencyError, DependencyResult, Key, ScopeKind, TypeKey};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 实例槽
pub type InstanceSlot = Arc<OnceCell<Instance>>;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_REQUESTS: RefCell<HashMap<u64, Uuid>> = RefCell::new(HashMap::new());
    static ACTIVE_SESSIONS: RefCell<HashMap<u64, String>> = RefCell::new(HashMap::new());
}

/// 单个上下文中的实例存储
#[derive(Default)]
pub struct ContextStore {
    slots: DashMap<TypeKey, InstanceSlot>,
}

impl ContextStore {
    fn slot(&self, origin: TypeKey) -> InstanceSlot {
        Arc::clone(self.slots.entry(origin).or_default().value())
    }

    fn evict(&self, origin: TypeKey) {
        self.slots.remove(&origin);
    }

    fn clear(&self) {
        self.slots.clear();
    }

    /// 已创建的实例数量
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    /// 是否没有任何实例
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 作用域管理器
pub struct ScopeManager {
    id: u64,
    singleton: Arc<ContextStore>,
    application: Arc<ContextStore>,
    requests: DashMap<Uuid, Arc<ContextStore>>,
    sessions: DashMap<String, Arc<ContextStore>>,
    session_provider: RwLock<Option<Arc<dyn SessionIdProvider>>>,
}

impl ScopeManager {
    /// 创建作用域管理器
    pub fn new() -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            singleton: Arc::default(),
            application: Arc::default(),
            requests: DashMap::new(),
            sessions: DashMap::new(),
            session_provider: RwLock::new(None),
        }
    }

    /// 获取绑定在当前上下文中的实例槽，无作用域绑定返回 `None`
    pub fn slot_for(&self, binding: &Binding) -> DependencyResult<Option<InstanceSlot>> {
        let store = match binding.scope() {
            ScopeKind::Unscoped => return Ok(None),
            ScopeKind::Singleton => Arc::clone(&self.singleton),
            ScopeKind::Application => Arc::clone(&self.application),
            ScopeKind::Request => self.request_store(binding.key())?,
            ScopeKind::Session => self.session_store(binding.key())?,
        };
        Ok(Some(store.slot(binding.origin())))
    }

    fn request_store(&self, key: &Key) -> DependencyResult<Arc<ContextStore>> {
        self.active_request()
            .and_then(|id| self.requests.get(&id).map(|store| Arc::clone(store.value())))
            .ok_or_else(|| DependencyError::NoActiveContext {
                scope: ScopeKind::Request.to_string(),
                key: key.clone(),
            })
    }

    fn session_store(&self, key: &Key) -> DependencyResult<Arc<ContextStore>> {
        let id = self
            .current_session()
            .ok_or_else(|| DependencyError::NoActiveContext {
                scope: ScopeKind::Session.to_string(),
                key: key.clone(),
            })?;
        Ok(Arc::clone(self.sessions.entry(id).or_default().value()))
    }

    /// 开始一个请求上下文并激活到当前线程，返回 (新请求标识, 之前激活的请求标识)
    pub fn begin_request(&self) -> (Uuid, Option<Uuid>) {
        let id = Uuid::new_v4();
        self.requests.insert(id, Arc::default());
        let previous = ACTIVE_REQUESTS.with(|active| active.borrow_mut().insert(self.id, id));
        debug!("开始请求上下文: {}", id);
        (id, previous)
    }

    /// 结束请求上下文，销毁其中的实例并恢复之前激活的请求
    pub fn end_request(&self, id: Uuid, previous: Option<Uuid>) {
        self.requests.remove(&id);
        ACTIVE_REQUESTS.with(|active| {
            let mut active = active.borrow_mut();
            if active.get(&self.id) == Some(&id) {
                match previous {
                    Some(previous) => active.insert(self.id, previous),
                    None => active.remove(&self.id),
                };
            }
        });
        debug!("结束请求上下文: {}", id);
    }

    /// 当前线程激活的请求标识
    pub fn active_request(&self) -> Option<Uuid> {
        ACTIVE_REQUESTS.with(|active| active.borrow().get(&self.id).copied())
    }

    /// 把当前线程关联到会话，返回之前关联的会话标识
    pub fn associate_session(&self, id: impl Into<String>) -> Option<String> {
        let id = id.into();
        debug!("关联会话上下文: {}", id);
        ACTIVE_SESSIONS.with(|active| active.borrow_mut().insert(self.id, id))
    }

    /// 解除当前线程的会话关联，恢复之前的关联
    pub fn dissociate_session(&self, previous: Option<String>) {
        ACTIVE_SESSIONS.with(|active| {
            let mut active = active.borrow_mut();
            match previous {
                Some(previous) => active.insert(self.id, previous),
                None => active.remove(&self.id),
            };
        });
    }

    /// 当前会话标识：优先使用线程关联，其次询问外部提供者
    pub fn current_session(&self) -> Option<String> {
        ACTIVE_SESSIONS
            .with(|active| active.borrow().get(&self.id).cloned())
            .or_else(|| {
                self.session_provider
                    .read()
                    .as_ref()
                    .and_then(|provider| provider.current_session_id())
            })
    }

    /// 销毁会话上下文
    pub fn destroy_session(&self, id: &str) -> bool {
        let destroyed = self.sessions.remove(id).is_some();
        if destroyed {
            debug!("销毁会话上下文: {}", id);
        }
        destroyed
    }

    /// 设置外部会话标识提供者
    pub fn set_session_provider(&self, provider: Arc<dyn SessionIdProvider>) {
        *self.session_provider.write() = Some(provider);
    }

    /// 丢弃所有上下文中由指定类型声明的实例
    pub fn evict(&self, origin: TypeKey) {
        self.singleton.evict(origin);
        self.application.evict(origin);
        for store in self.requests.iter() {
            store.evict(origin);
        }
        for store in self.sessions.iter() {
            store.evict(origin);
        }
    }

    /// 清空所有上下文
    pub fn clear(&self) {
        self.singleton.clear();
        self.application.clear();
        self.requests.clear();
        self.sessions.clear();
        debug!("已清空全部作用域上下文");
    }

    /// 活动的请求上下文数量
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// 存在的会话上下文数量
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}
