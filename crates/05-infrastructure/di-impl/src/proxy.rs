//! 上下文代理的运行时实现

use crate::container::Container;
use crate::registry::Binding;
use di_abstractions::{ContextResolver, Instance, ResolveContext};
use infrastructure_common::{DependencyError, Key, ScopeKind};
use std::sync::{Arc, Weak};

/// 上下文代理句柄
///
/// 只持有绑定与容器的弱引用，每次调用都在当前活动上下文中重新定位实例。
pub(crate) struct ContextualHandle {
    binding: Arc<Binding>,
    container: Weak<Container>,
}

impl ContextualHandle {
    pub(crate) fn new(binding: Arc<Binding>, container: Weak<Container>) -> Self {
        Self { binding, container }
    }
}

impl ContextResolver for ContextualHandle {
    fn current_instance(&self) -> Result<Instance, DependencyError> {
        let container = self
            .container
            .upgrade()
            .ok_or_else(|| DependencyError::InvalidState {
                message: format!("运行时已释放，无法解析 {}", self.binding.key()),
            })?;
        let mut ctx = ResolveContext::new(container.max_depth());
        container.instance_for(&self.binding, &mut ctx)
    }

    fn key(&self) -> &Key {
        self.binding.key()
    }

    fn scope(&self) -> ScopeKind {
        self.binding.scope()
    }
}
