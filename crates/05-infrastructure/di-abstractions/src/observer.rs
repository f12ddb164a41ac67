//! 事件观察者

use crate::proxy::Instance;
use infrastructure_common::{BoxError, Key, Qualifier, TypeKey};
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

/// 观察者回调
///
/// 第一个参数是声明观察者的 Bean 实例（自由函数观察者为 `None`），
/// 第二个参数是事件负载。
pub type ObserverCallback =
    Arc<dyn Fn(Option<&Instance>, &(dyn Any + Send + Sync)) -> Result<(), BoxError> + Send + Sync>;

/// 观察者方法
#[derive(Clone)]
pub struct ObserverMethod {
    event_type: TypeKey,
    qualifiers: BTreeSet<Qualifier>,
    asynchronous: bool,
    declaring: Option<Key>,
    callback: ObserverCallback,
}

impl ObserverMethod {
    /// 自由函数观察者
    pub fn function<E, F>(
        qualifiers: impl IntoIterator<Item = Qualifier>,
        asynchronous: bool,
        f: F,
    ) -> Self
    where
        E: Any + Send + Sync,
        F: Fn(&E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let callback: ObserverCallback = Arc::new(
            move |_bean: Option<&Instance>, event: &(dyn Any + Send + Sync)| {
                match event.downcast_ref::<E>() {
                    Some(event) => f(event),
                    None => Err(mismatch::<E>()),
                }
            },
        );
        Self {
            event_type: TypeKey::of::<E>(),
            qualifiers: qualifiers.into_iter().collect(),
            asynchronous,
            declaring: None,
            callback,
        }
    }

    /// Bean 方法观察者，分发时先解析声明它的 Bean 实例
    pub fn method<T, E, F>(
        declaring: Key,
        qualifiers: impl IntoIterator<Item = Qualifier>,
        asynchronous: bool,
        f: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        E: Any + Send + Sync,
        F: Fn(&T, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let callback: ObserverCallback = Arc::new(
            move |bean: Option<&Instance>, event: &(dyn Any + Send + Sync)| {
                let bean = bean
                    .and_then(|bean| bean.downcast_ref::<T>())
                    .ok_or_else(|| mismatch::<T>())?;
                let event = event.downcast_ref::<E>().ok_or_else(|| mismatch::<E>())?;
                f(bean, event)
            },
        );
        Self {
            event_type: TypeKey::of::<E>(),
            qualifiers: qualifiers.into_iter().collect(),
            asynchronous,
            declaring: Some(declaring),
            callback,
        }
    }

    /// 替换声明 Bean 的绑定键
    pub fn with_declaring(mut self, declaring: Key) -> Self {
        if self.declaring.is_some() {
            self.declaring = Some(declaring);
        }
        self
    }

    /// 事件类型
    pub fn event_type(&self) -> TypeKey {
        self.event_type
    }

    /// 限定符集合
    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    /// 是否异步观察者
    pub fn is_async(&self) -> bool {
        self.asynchronous
    }

    /// 声明观察者的 Bean 绑定键
    pub fn declaring(&self) -> Option<&Key> {
        self.declaring.as_ref()
    }

    /// 是否匹配事件类型与限定符集合
    pub fn matches(&self, event_type: TypeKey, qualifiers: &BTreeSet<Qualifier>) -> bool {
        self.event_type == event_type && &self.qualifiers == qualifiers
    }

    /// 调用观察者
    pub fn notify(
        &self,
        bean: Option<&Instance>,
        event: &(dyn Any + Send + Sync),
    ) -> Result<(), BoxError> {
        (self.callback)(bean, event)
    }
}

impl std::fmt::Debug for ObserverMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverMethod")
            .field("event_type", &self.event_type)
            .field("qualifiers", &self.qualifiers)
            .field("asynchronous", &self.asynchronous)
            .field("declaring", &self.declaring)
            .finish()
    }
}

fn mismatch<T>() -> BoxError {
    format!("观察者参数类型不匹配: {}", std::any::type_name::<T>()).into()
}
