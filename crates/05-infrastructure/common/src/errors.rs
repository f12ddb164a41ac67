//! 错误类型定义

use crate::metadata::Key;
use thiserror::Error;

/// 用户代码（构造器、观察者、扩展）返回的错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },

    #[error("配置类型转换失败: {message}")]
    TypeConversionError { message: String },

    #[error("配置项格式错误: {message}")]
    IllFormed { message: String },
}

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("未找到匹配的绑定: {key}")]
    Unresolved { key: Key },

    #[error("必需的依赖无法解析: {key}, 注入点 {field} 位于 {owner}")]
    RequiredDependencyMissing {
        owner: String,
        field: String,
        key: Key,
    },

    #[error("组件创建失败: {key}, 原因: {source}")]
    CreationFailed { key: Key, source: BoxError },

    #[error("组件不可实例化: {type_name}, 原因: {reason}")]
    NotInstantiable { type_name: String, reason: String },

    #[error("检测到循环依赖: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("超过最大解析深度 {max_depth}: {key}")]
    ResolutionTooDeep { key: Key, max_depth: usize },

    #[error("作用域不匹配: 期望 {expected}, 实际 {actual}")]
    ScopeMismatch { expected: String, actual: String },

    #[error("没有活动的 {scope} 上下文: {key}")]
    NoActiveContext { scope: String, key: Key },

    #[error("类型转换失败: 期望 {expected}, 绑定 {key}")]
    TypeMismatch { expected: &'static str, key: Key },

    #[error("观察者执行失败: 事件 {event}, 原因: {source}")]
    ObserverFailed { event: String, source: BoxError },

    #[error("运行时状态错误: {message}")]
    InvalidState { message: String },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },

    #[error("扩展 {name} 执行失败: {source}")]
    ExtensionFailed { name: String, source: BoxError },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("基础设施关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
