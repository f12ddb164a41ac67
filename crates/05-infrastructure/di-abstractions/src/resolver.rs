//! 解析上下文及外部解析接口

use crate::proxy::Instance;
use infrastructure_common::{DependencyError, Key, TypeKey};
use std::sync::Arc;

/// 默认最大解析深度
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 64;

/// 解析上下文
///
/// 记录一次解析过程中正在构造的绑定键链，用于检测循环依赖。
/// 同一类型的多个绑定共享实例槽，正在初始化的槽按声明类型另行记录。
#[derive(Debug, Clone)]
pub struct ResolveContext {
    chain: Vec<Key>,
    shared: Vec<TypeKey>,
    max_depth: usize,
}

impl ResolveContext {
    /// 创建新的解析上下文
    pub fn new(max_depth: usize) -> Self {
        Self {
            chain: Vec::new(),
            shared: Vec::new(),
            max_depth,
        }
    }

    /// 进入一个绑定键的构造
    pub fn enter(&mut self, key: &Key) -> Result<(), DependencyError> {
        self.check_cycle(key)?;
        if self.chain.len() >= self.max_depth {
            return Err(DependencyError::ResolutionTooDeep {
                key: key.clone(),
                max_depth: self.max_depth,
            });
        }
        self.chain.push(key.clone());
        Ok(())
    }

    /// 检查绑定键是否已在解析链中
    pub fn check_cycle(&self, key: &Key) -> Result<(), DependencyError> {
        if !self.contains(key) {
            return Ok(());
        }
        Err(self.cycle(key))
    }

    /// 进入声明类型共享实例槽的初始化
    ///
    /// 同一线程重入尚未初始化完成的槽视为循环依赖。
    pub fn enter_shared(&mut self, origin: TypeKey, key: &Key) -> Result<(), DependencyError> {
        if self.shared.contains(&origin) {
            return Err(self.cycle(key));
        }
        self.shared.push(origin);
        Ok(())
    }

    /// 离开最近进入的共享实例槽
    pub fn exit_shared(&mut self) {
        self.shared.pop();
    }

    fn cycle(&self, key: &Key) -> DependencyError {
        let mut chain: Vec<String> = self.chain.iter().map(ToString::to_string).collect();
        chain.push(key.to_string());
        DependencyError::CircularDependency {
            dependency_chain: chain.join(" -> "),
        }
    }

    /// 离开最近进入的绑定键
    pub fn exit(&mut self) {
        self.chain.pop();
    }

    /// 是否正在构造指定绑定键
    pub fn contains(&self, key: &Key) -> bool {
        self.chain.contains(key)
    }

    /// 当前深度
    pub fn depth(&self) -> usize {
        self.chain.len()
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESOLUTION_DEPTH)
    }
}

/// 名称解析器
///
/// 外部表达式层通过 Bean 名称查找实例
pub trait NameResolver: Send + Sync {
    /// 按名称解析实例
    fn resolve_name(&self, name: &str) -> Option<Instance>;
}

/// 名称解析器宿主
///
/// 例如 Web 层的属性解析器链，扩展启动时会把运行时注册进去
pub trait AttributeResolverHost: Send + Sync {
    /// 添加名称解析器
    fn add_resolver(&self, resolver: Arc<dyn NameResolver>);
}

/// 会话标识提供者
///
/// 由外部 Web 层实现，返回当前线程所处理请求对应的会话标识
pub trait SessionIdProvider: Send + Sync {
    /// 当前会话标识
    fn current_session_id(&self) -> Option<String>;
}
