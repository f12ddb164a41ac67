//! 注入点与依赖集合

use crate::proxy::{ContextResolver, Contextual, Instance};
use infrastructure_common::{BoxError, DependencyError, Key, Marker, Qualifier, TypeKey};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// 注入点
///
/// 描述 Bean 的一个依赖字段：字段名、绑定键、是否必需以及可选的标记。
/// 在 Bean 元数据构建时计算一次，之后每次实例化都复用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    field: String,
    key: Key,
    required: bool,
    marker: Option<Marker>,
}

impl InjectionPoint {
    /// 必需的默认绑定注入点
    pub fn of<T: ?Sized + 'static>(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            key: Key::of::<T>(),
            required: true,
            marker: None,
        }
    }

    /// 带标记的注入点，由对应的 [`InjectionPointBuilder`] 提供取值
    ///
    /// 标记注入点默认是可选的，构建器未给出值时字段为空。
    pub fn marked<T: ?Sized + 'static>(field: impl Into<String>, marker: Marker) -> Self {
        Self {
            field: field.into(),
            key: Key::of::<T>(),
            required: false,
            marker: Some(marker),
        }
    }

    /// 追加限定符
    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        self.key = self.key.with_qualifier(qualifier);
        self
    }

    /// 标记为可选依赖
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// 字段名
    pub fn field(&self) -> &str {
        &self.field
    }

    /// 绑定键
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// 是否必需
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// 标记
    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }
}

/// 注入点构建器
///
/// 扩展通过它为携带特定标记的注入点提供值，例如配置属性注入。
pub trait InjectionPointBuilder: Send + Sync {
    /// 处理的标记名称
    fn marker(&self) -> &str;

    /// 校验注入点是否合法
    fn validate(&self, _point: &InjectionPoint) -> Result<(), String> {
        Ok(())
    }

    /// 为注入点构建值，`None` 表示没有可注入的值
    fn build(&self, point: &InjectionPoint) -> Result<Option<Instance>, BoxError>;
}

/// 已解析的注入值
#[derive(Clone)]
pub enum Injected {
    /// 实例
    Instance(Instance),
    /// 上下文作用域依赖的代理
    Proxy(Arc<dyn ContextResolver>),
    /// 可选依赖缺失
    Absent,
}

impl std::fmt::Debug for Injected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Instance"),
            Self::Proxy(target) => write!(f, "Proxy({})", target.key()),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

#[derive(Debug)]
struct Slot {
    key: Key,
    value: Injected,
}

/// 构造器收到的依赖集合
#[derive(Debug)]
pub struct Dependencies {
    owner: TypeKey,
    slots: HashMap<String, Slot>,
}

impl Dependencies {
    /// 创建空的依赖集合
    pub fn new(owner: TypeKey) -> Self {
        Self {
            owner,
            slots: HashMap::new(),
        }
    }

    /// 写入字段值
    pub fn insert(&mut self, field: impl Into<String>, key: Key, value: Injected) {
        self.slots.insert(field.into(), Slot { key, value });
    }

    /// 所属 Bean 类型
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// 获取必需依赖
    pub fn get<T: Any + Send + Sync>(&self, field: &str) -> Result<Arc<T>, DependencyError> {
        self.optional::<T>(field)?
            .ok_or_else(|| self.missing(field))
    }

    /// 获取可选依赖
    pub fn optional<T: Any + Send + Sync>(
        &self,
        field: &str,
    ) -> Result<Option<Arc<T>>, DependencyError> {
        let slot = self.slot(field)?;
        match &slot.value {
            Injected::Instance(instance) => Arc::clone(instance)
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DependencyError::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                    key: slot.key.clone(),
                }),
            Injected::Proxy(target) => Err(DependencyError::ScopeMismatch {
                expected: "直接实例".to_string(),
                actual: format!("{} 作用域代理 ({})", target.scope(), field),
            }),
            Injected::Absent => Ok(None),
        }
    }

    /// 获取上下文作用域依赖的代理
    pub fn contextual<T: Any + Send + Sync>(
        &self,
        field: &str,
    ) -> Result<Contextual<T>, DependencyError> {
        let slot = self.slot(field)?;
        match &slot.value {
            Injected::Proxy(target) => Ok(Contextual::new(Arc::clone(target))),
            Injected::Instance(_) => Err(DependencyError::ScopeMismatch {
                expected: "上下文作用域代理".to_string(),
                actual: format!("直接实例 ({})", field),
            }),
            Injected::Absent => Err(self.missing(field)),
        }
    }

    /// 获取值类型依赖的副本（例如配置属性）
    pub fn value<T: Any + Send + Sync + Clone>(&self, field: &str) -> Result<T, DependencyError> {
        self.get::<T>(field).map(|v| (*v).clone())
    }

    /// 获取可选的值类型依赖副本
    pub fn optional_value<T: Any + Send + Sync + Clone>(
        &self,
        field: &str,
    ) -> Result<Option<T>, DependencyError> {
        Ok(self.optional::<T>(field)?.map(|v| (*v).clone()))
    }

    fn slot(&self, field: &str) -> Result<&Slot, DependencyError> {
        self.slots
            .get(field)
            .ok_or_else(|| DependencyError::InvalidState {
                message: format!("{} 未声明注入点 {}", self.owner, field),
            })
    }

    fn missing(&self, field: &str) -> DependencyError {
        let key = self
            .slots
            .get(field)
            .map(|slot| slot.key.clone())
            .unwrap_or_else(|| Key::of::<()>());
        DependencyError::RequiredDependencyMissing {
            owner: self.owner.to_string(),
            field: field.to_string(),
            key,
        }
    }
}
