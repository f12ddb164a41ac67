//! # 基础设施组合层
//!
//! 把配置、依赖注入运行时和内置扩展组装成一个可运行的 [`Environment`]。
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::{init_tracing, EnvironmentBuilder, LoggingConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_tracing(&LoggingConfig::default())?;
//!
//!     let environment = EnvironmentBuilder::new()
//!         .with_bundled_properties("app.properties", "app.name=demo\n")
//!         .with_override_from_env()
//!         .start()?;
//!
//!     environment.stop()?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod extensions;
pub mod logging;

pub use builder::EnvironmentBuilder;
pub use extensions::{ConfigExtension, ResolverRegistrationExtension, TransactionExtension};
pub use logging::{init_tracing, LoggingConfig};

// 重新导出常用类型
pub use di_impl::Environment;
pub use infrastructure_common::InfrastructureError;
