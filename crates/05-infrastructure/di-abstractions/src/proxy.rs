//! 上下文代理
//!
//! 请求/会话作用域的依赖被注入到长生命周期的 Bean 中时，注入的不是实例本身，
//! 而是一个 [`Contextual`] 句柄。句柄只持有绑定信息，每次调用都重新定位
//! 当前线程活动上下文中的实例，从不缓存目标。

use infrastructure_common::{DependencyError, Key, ScopeKind};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// 类型擦除后的实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 上下文实例解析器
///
/// 由运行时实现，负责在调用时找到当前活动上下文中的实例
pub trait ContextResolver: Send + Sync {
    /// 解析当前活动上下文中的实例，必要时延迟创建
    fn current_instance(&self) -> Result<Instance, DependencyError>;

    /// 目标绑定键
    fn key(&self) -> &Key;

    /// 目标作用域
    fn scope(&self) -> ScopeKind;
}

/// 上下文代理句柄
pub struct Contextual<T> {
    target: Arc<dyn ContextResolver>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Contextual<T> {
    /// 创建代理句柄
    pub fn new(target: Arc<dyn ContextResolver>) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }

    /// 获取当前上下文中的实例
    pub fn get(&self) -> Result<Arc<T>, DependencyError> {
        let instance = self.target.current_instance()?;
        instance
            .downcast::<T>()
            .map_err(|_| DependencyError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                key: self.target.key().clone(),
            })
    }

    /// 在当前上下文的实例上执行操作
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, DependencyError> {
        let instance = self.get()?;
        Ok(f(&instance))
    }

    /// 目标绑定键
    pub fn key(&self) -> &Key {
        self.target.key()
    }

    /// 目标作用域
    pub fn scope(&self) -> ScopeKind {
        self.target.scope()
    }
}

impl<T> Clone for Contextual<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Contextual<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contextual")
            .field("key", self.target.key())
            .field("scope", &self.target.scope())
            .finish()
    }
}
