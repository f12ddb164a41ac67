//! # Configuration Implementation
//!
//! 分层 properties 配置以及 `ConfigProperty` 注入点构建器。
//!
//! ## 主要组件
//!
//! - [`PropertiesSource`] - properties 文本配置源
//! - [`LayeredConfig`] - 打包配置 + 覆盖文件的分层配置
//! - [`ConfigValueBuilder`] - 配置属性注入点构建器

pub mod builder;
pub mod layered;
pub mod properties;

pub use builder::{ConfigValueBuilder, ConfigValueKind};
pub use layered::{LayeredConfig, LayeredConfigBuilder, OVERRIDE_ENV};
pub use properties::PropertiesSource;
