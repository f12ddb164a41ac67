//! 配置属性注入点构建器

use config_abstractions::{ConfigProperty, ConfigProvider, CONFIG_PROPERTY_MARKER};
use di_abstractions::{Instance, InjectionPoint, InjectionPointBuilder};
use infrastructure_common::{BoxError, TypeKey};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 可注入的配置值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueKind {
    /// `String`
    Text,
    /// `bool`
    Bool,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

impl ConfigValueKind {
    /// 根据字段类型选择值类型，不支持的类型返回 `None`
    pub fn of(type_key: TypeKey) -> Option<Self> {
        let kind = if type_key.is::<String>() {
            Self::Text
        } else if type_key.is::<bool>() {
            Self::Bool
        } else if type_key.is::<i32>() {
            Self::I32
        } else if type_key.is::<i64>() {
            Self::I64
        } else if type_key.is::<u32>() {
            Self::U32
        } else if type_key.is::<u64>() {
            Self::U64
        } else if type_key.is::<usize>() {
            Self::Usize
        } else if type_key.is::<f32>() {
            Self::F32
        } else if type_key.is::<f64>() {
            Self::F64
        } else {
            return None;
        };
        Some(kind)
    }

    /// 转换原始字符串
    ///
    /// 无法解析的数值得到零，布尔值只有忽略大小写的 `true` 为真。
    pub fn convert(self, raw: &str) -> Instance {
        let trimmed = raw.trim();
        match self {
            Self::Text => Arc::new(raw.to_string()),
            Self::Bool => Arc::new(trimmed.eq_ignore_ascii_case("true")),
            Self::I32 => Arc::new(trimmed.parse::<i32>().unwrap_or_default()),
            Self::I64 => Arc::new(trimmed.parse::<i64>().unwrap_or_default()),
            Self::U32 => Arc::new(trimmed.parse::<u32>().unwrap_or_default()),
            Self::U64 => Arc::new(trimmed.parse::<u64>().unwrap_or_default()),
            Self::Usize => Arc::new(trimmed.parse::<usize>().unwrap_or_default()),
            Self::F32 => Arc::new(trimmed.parse::<f32>().unwrap_or_default()),
            Self::F64 => Arc::new(trimmed.parse::<f64>().unwrap_or_default()),
        }
    }
}

/// 为 `ConfigProperty` 注入点提供配置值
#[derive(Clone)]
pub struct ConfigValueBuilder {
    provider: Arc<dyn ConfigProvider>,
}

impl ConfigValueBuilder {
    /// 基于配置提供者创建
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        Self { provider }
    }

    /// 配置提供者
    pub fn provider(&self) -> &Arc<dyn ConfigProvider> {
        &self.provider
    }

    fn describe(
        point: &InjectionPoint,
    ) -> Result<(String, Option<String>, ConfigValueKind), String> {
        let property = point
            .marker()
            .and_then(ConfigProperty::from_marker)
            .ok_or_else(|| {
                format!(
                    "注入点 {} 未携带 {} 标记",
                    point.field(),
                    CONFIG_PROPERTY_MARKER
                )
            })?;
        let name = property
            .name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| format!("注入点 {} 缺少配置属性名", point.field()))?;
        let kind = ConfigValueKind::of(point.key().type_key()).ok_or_else(|| {
            format!(
                "注入点 {} 的类型 {} 不支持配置注入",
                point.field(),
                point.key().type_key()
            )
        })?;
        Ok((
            name.to_string(),
            property.default_value().map(str::to_string),
            kind,
        ))
    }
}

impl InjectionPointBuilder for ConfigValueBuilder {
    fn marker(&self) -> &str {
        CONFIG_PROPERTY_MARKER
    }

    fn validate(&self, point: &InjectionPoint) -> Result<(), String> {
        Self::describe(point).map(|_| ())
    }

    fn build(&self, point: &InjectionPoint) -> Result<Option<Instance>, BoxError> {
        let (name, default, kind) = match Self::describe(point) {
            Ok(described) => described,
            Err(reason) => {
                debug!("跳过格式错误的配置注入点: {}", reason);
                return Ok(None);
            }
        };

        let raw = self.provider.get(&name).or(default);
        debug!(
            "配置注入: property={}, field={}, found={}",
            name,
            point.field(),
            raw.is_some()
        );
        Ok(raw.map(|raw| kind.convert(&raw)))
    }
}

impl fmt::Debug for ConfigValueBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigValueBuilder")
            .field("provider", &self.provider.name())
            .finish()
    }
}
