//! 元数据定义
//!
//! 提供类型标识、限定符以及绑定键 [`Key`]

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 类型标识
///
/// 相等性与哈希只取决于 [`TypeId`]，名称仅用于日志和错误信息。
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 从类型获取类型标识
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// 类型ID
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名称（包含模块路径）
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// 是否为指定类型
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 限定符
///
/// 带成员值的命名区分器。两个限定符相等当且仅当名称和全部成员值都相等。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier {
    name: String,
    members: BTreeMap<String, String>,
}

impl Qualifier {
    /// `Named` 限定符的名称
    pub const NAMED: &'static str = "Named";

    /// 创建不带成员的限定符
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// 创建 `Named(value = ...)` 限定符
    pub fn named(value: impl Into<String>) -> Self {
        Self::new(Self::NAMED).with_member("value", value)
    }

    /// 添加成员值
    pub fn with_member(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.members.insert(key.into(), value.into());
        self
    }

    /// 限定符名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 获取成员值
    pub fn member(&self, key: &str) -> Option<&str> {
        self.members.get(key).map(String::as_str)
    }

    /// 全部成员
    pub fn members(&self) -> &BTreeMap<String, String> {
        &self.members
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.members.is_empty() {
            let members = self
                .members
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "({})", members)?;
        }
        Ok(())
    }
}

/// 注入点标记
///
/// 普通的类型 + 限定符注入无法满足的注入点会携带标记，由扩展注册的
/// 注入点构建器按标记名称处理（例如 `ConfigProperty`）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    name: String,
    members: BTreeMap<String, String>,
}

impl Marker {
    /// 创建标记
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// 添加成员值
    pub fn with_member(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.members.insert(key.into(), value.into());
        self
    }

    /// 标记名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 获取成员值
    pub fn member(&self, key: &str) -> Option<&str> {
        self.members.get(key).map(String::as_str)
    }
}

/// 绑定键
///
/// `(类型, 限定符集合)`，所有查找都以它为准。限定符集合无序，
/// 空集合表示默认绑定。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    type_key: TypeKey,
    qualifiers: BTreeSet<Qualifier>,
}

impl Key {
    /// 默认（无限定符）键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), std::iter::empty())
    }

    /// 带限定符的键
    pub fn qualified<T: ?Sized + 'static>(qualifiers: impl IntoIterator<Item = Qualifier>) -> Self {
        Self::new(TypeKey::of::<T>(), qualifiers)
    }

    /// 创建键
    pub fn new(type_key: TypeKey, qualifiers: impl IntoIterator<Item = Qualifier>) -> Self {
        Self {
            type_key,
            qualifiers: qualifiers.into_iter().collect(),
        }
    }

    /// 追加限定符
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// 类型标识
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// 限定符集合
    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    /// 是否为默认绑定键
    pub fn is_default(&self) -> bool {
        self.qualifiers.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for qualifier in &self.qualifiers {
            write!(f, "{} ", qualifier)?;
        }
        write!(f, "{}", self.type_key)
    }
}
