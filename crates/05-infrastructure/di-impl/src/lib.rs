//! # 依赖注入运行时
//!
//! 提供绑定注册表、作用域与上下文代理、事件总线、扩展生命周期以及事务传播拦截器。
//!
//! ## 快速开始
//!
//! ```ignore
//! use di_abstractions::BeanClass;
//! use di_impl::Environment;
//! use infrastructure_common::ScopeKind;
//!
//! let env = Environment::new();
//! env.add([BeanClass::of::<Greeter>()
//!     .scope(ScopeKind::Singleton)
//!     .default_constructor()
//!     .build()]);
//! env.start()?;
//! let greeter = env.get::<Greeter>()?;
//! ```

mod container;
mod proxy;

pub mod dispatch;
pub mod environment;
pub mod events;
pub mod extension;
pub mod manifest;
pub mod registry;
pub mod scope;
pub mod transaction;

pub use dispatch::DispatchPool;
pub use environment::{Environment, EnvironmentConfig, RequestScope, SessionScope};
pub use events::EventBus;
pub use extension::{Extension, EXTENSION_CATALOG};
pub use manifest::ClassManifest;
pub use registry::{Binding, BindingRegistry, BindingSource};
pub use scope::{ContextStore, InstanceSlot, ScopeManager};
pub use transaction::{
    Propagation, TransactionError, TransactionFrame, TransactionInterceptor, TransactionResource,
    TransactionResult,
};

#[doc(hidden)]
pub mod __private {
    pub use ctor;
}
