//! 配置属性注入点
//!
//! 携带 `ConfigProperty` 标记的注入点由配置扩展注册的构建器按属性名取值。

use di_abstractions::InjectionPoint;
use infrastructure_common::Marker;

/// 配置属性标记名称
pub const CONFIG_PROPERTY_MARKER: &str = "ConfigProperty";

const NAME_MEMBER: &str = "name";
const DEFAULT_MEMBER: &str = "default";

/// 配置属性描述
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigProperty {
    name: Option<String>,
    default: Option<String>,
}

impl ConfigProperty {
    /// 按属性名创建
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            default: None,
        }
    }

    /// 设置属性缺失时使用的默认值
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// 属性名
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 默认值
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// 从标记读取，标记名称不匹配时返回 `None`
    pub fn from_marker(marker: &Marker) -> Option<Self> {
        if marker.name() != CONFIG_PROPERTY_MARKER {
            return None;
        }
        Some(Self {
            name: marker.member(NAME_MEMBER).map(str::to_string),
            default: marker.member(DEFAULT_MEMBER).map(str::to_string),
        })
    }

    /// 转换为注入点标记
    pub fn to_marker(&self) -> Marker {
        let mut marker = Marker::new(CONFIG_PROPERTY_MARKER);
        if let Some(name) = &self.name {
            marker = marker.with_member(NAME_MEMBER, name.clone());
        }
        if let Some(default) = &self.default {
            marker = marker.with_member(DEFAULT_MEMBER, default.clone());
        }
        marker
    }

    /// 生成类型为 `T` 的配置注入点
    pub fn point<T: 'static>(&self, field: impl Into<String>) -> InjectionPoint {
        InjectionPoint::marked::<T>(field, self.to_marker())
    }
}
