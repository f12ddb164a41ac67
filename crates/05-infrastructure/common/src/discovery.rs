//! 进程级发现目录
//!
//! 在程序启动时（通过 `ctor`）登记提供者，运行时按登记顺序读取。
//! 目录只保存提供者函数，不保存任何运行时状态，多个 Environment
//! 共享同一目录互不影响。

use parking_lot::RwLock;
use tracing::debug;

/// 目录条目
pub struct CatalogEntry<T> {
    /// 条目名称（通常为完整类型名）
    pub name: &'static str,
    /// 提供者函数
    pub provider: fn() -> T,
}

impl<T> Clone for CatalogEntry<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CatalogEntry<T> {}

impl<T> std::fmt::Debug for CatalogEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("provider", &"<function>")
            .finish()
    }
}

/// 进程级发现目录
pub struct Catalog<T> {
    kind: &'static str,
    entries: RwLock<Vec<CatalogEntry<T>>>,
}

impl<T> Catalog<T> {
    /// 创建空目录，可用于 `static`
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: parking_lot::const_rwlock(Vec::new()),
        }
    }

    /// 登记提供者，同名条目只保留第一次登记
    pub fn register(&self, name: &'static str, provider: fn() -> T) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|entry| entry.name == name) {
            return false;
        }
        entries.push(CatalogEntry { name, provider });
        debug!("登记 {} 提供者: {}", self.kind, name);
        true
    }

    /// 按名称查找提供者
    pub fn lookup(&self, name: &str) -> Option<CatalogEntry<T>> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.name == name)
            .copied()
    }

    /// 按登记顺序返回全部条目
    pub fn entries(&self) -> Vec<CatalogEntry<T>> {
        self.entries.read().clone()
    }

    /// 目录类别
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
