//! # Infrastructure Common
//!
//! 这个 crate 提供了依赖注入运行时各层共享的基础类型。
//!
//! ## 核心类型
//!
//! - [`TypeKey`] / [`Qualifier`] / [`Key`] - 绑定键及其组成部分
//! - [`Marker`] - 注入点标记
//! - [`ScopeKind`] - 作用域类型
//! - [`LifecycleState`] - 运行时生命周期状态
//! - [`Catalog`] - 进程级发现目录
//! - 错误类型 [`DependencyError`] / [`ConfigError`] / [`InfrastructureError`]

pub mod discovery;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use discovery::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;

use once_cell::sync::Lazy;

static RUNTIME_IDENTITY: Lazy<String> =
    Lazy::new(|| format!("{}@{}", std::process::id(), uuid::Uuid::new_v4()));

/// 当前进程的运行时标识，格式为 `<pid>@<uuid>`
///
/// 同一进程内始终返回相同的值。
pub fn runtime_identity() -> &'static str {
    RUNTIME_IDENTITY.as_str()
}
