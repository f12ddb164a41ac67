//! # Configuration Abstractions
//!
//! 配置抽象层，定义配置来源接口和配置属性注入点的约定。
//!
//! ## 核心接口
//!
//! - [`ConfigProvider`] - 配置提供者接口
//! - [`ConfigProperty`] - 配置属性注入点描述

pub mod property;
pub mod provider;

pub use property::*;
pub use provider::*;
