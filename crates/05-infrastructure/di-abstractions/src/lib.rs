//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义 Bean 元数据、注入点、观察者以及上下文代理。
//!
//! ## 核心接口
//!
//! - [`BeanClass`] - 一次构建、反复使用的 Bean 元数据
//! - [`Injectable`] - 自描述的 Bean 类型
//! - [`InjectionPoint`] / [`InjectionPointBuilder`] - 注入点及可插拔的注入点构建器
//! - [`ObserverMethod`] - 事件观察者
//! - [`Contextual`] - 请求/会话作用域依赖的上下文代理
//! - [`NameResolver`] / [`AttributeResolverHost`] / [`SessionIdProvider`] - 与外部层交互的接口

pub mod bean;
pub mod discovery;
pub mod injection;
pub mod observer;
pub mod proxy;
pub mod resolver;

pub use bean::*;
pub use discovery::*;
pub use injection::*;
pub use observer::*;
pub use proxy::*;
pub use resolver::*;

#[doc(hidden)]
pub mod __private {
    pub use ctor;
}
