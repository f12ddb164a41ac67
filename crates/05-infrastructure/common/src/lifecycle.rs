//! 作用域与生命周期状态

use crate::errors::DependencyError;
use serde::{Deserialize, Serialize};

/// 作用域类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// 无作用域 - 每次解析都创建新实例，从不缓存
    Unscoped,
    /// 单例 - 在 Environment 生命周期内只创建一个实例
    Singleton,
    /// 应用作用域 - 整个应用上下文共享一个实例
    Application,
    /// 会话作用域 - 同一会话内共享实例
    Session,
    /// 请求作用域 - 同一请求内共享实例
    Request,
}

impl ScopeKind {
    /// 是否为上下文作用域（注入时返回代理）
    pub fn is_context_scoped(&self) -> bool {
        matches!(self, Self::Session | Self::Request)
    }

    /// 是否在全局范围内共享同一实例
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Singleton | Self::Application)
    }

    /// 作用域名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unscoped => "unscoped",
            Self::Singleton => "singleton",
            Self::Application => "application",
            Self::Session => "session",
            Self::Request => "request",
        }
    }
}

impl Default for ScopeKind {
    fn default() -> Self {
        Self::Unscoped
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScopeKind {
    type Err = DependencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unscoped" | "dependent" => Ok(Self::Unscoped),
            "singleton" => Ok(Self::Singleton),
            "application" => Ok(Self::Application),
            "session" => Ok(Self::Session),
            "request" => Ok(Self::Request),
            _ => Err(DependencyError::ScopeMismatch {
                expected: "unscoped|singleton|application|session|request".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// 运行时生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// 未初始化
    Uninitialized,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 错误状态
    Error,
}

impl LifecycleState {
    /// 是否可以启动
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Stopped | Self::Error)
    }

    /// 是否可以停止
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Uninitialized
    }
}
