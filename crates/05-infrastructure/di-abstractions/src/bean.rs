//! Bean 元数据
//!
//! [`BeanClass`] 是一个类型的全部注入元数据：作用域、限定符组合、注入点、
//! 观察者以及构造器。它在注册时构建一次，运行时不再做任何反射。

use crate::injection::{Dependencies, InjectionPoint};
use crate::observer::ObserverMethod;
use crate::proxy::Instance;
use infrastructure_common::{BoxError, Key, Qualifier, ScopeKind, TypeKey};
use std::any::Any;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// 类型擦除的构造器
pub type Constructor = Arc<dyn Fn(&Dependencies) -> Result<Instance, BoxError> + Send + Sync>;

/// Bean 元数据
#[derive(Clone)]
pub struct BeanClass {
    type_key: TypeKey,
    name: Option<String>,
    scope: ScopeKind,
    qualifier_sets: Vec<BTreeSet<Qualifier>>,
    injection_points: Arc<Vec<InjectionPoint>>,
    observers: Vec<ObserverMethod>,
    constructor: Option<Constructor>,
}

impl BeanClass {
    /// 开始构建类型 `T` 的元数据
    pub fn of<T: Any + Send + Sync>() -> BeanClassBuilder<T> {
        BeanClassBuilder::new()
    }

    /// 类型标识
    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Bean 名称
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 作用域
    pub fn scope(&self) -> ScopeKind {
        self.scope
    }

    /// 声明的限定符组合，未声明时为一个空集合
    pub fn qualifier_sets(&self) -> &[BTreeSet<Qualifier>] {
        &self.qualifier_sets
    }

    /// 每个限定符组合对应的绑定键
    pub fn keys(&self) -> Vec<Key> {
        self.qualifier_sets
            .iter()
            .map(|set| Key::new(self.type_key, set.iter().cloned()))
            .collect()
    }

    /// 注入点
    pub fn injection_points(&self) -> &Arc<Vec<InjectionPoint>> {
        &self.injection_points
    }

    /// 观察者
    pub fn observers(&self) -> &[ObserverMethod] {
        &self.observers
    }

    /// 构造器
    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// 是否可以实例化
    pub fn is_instantiable(&self) -> bool {
        self.constructor.is_some()
    }
}

impl std::fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanClass")
            .field("type_key", &self.type_key)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("qualifier_sets", &self.qualifier_sets)
            .field("injection_points", &self.injection_points)
            .field("observers", &self.observers.len())
            .field("instantiable", &self.is_instantiable())
            .finish()
    }
}

/// Bean 元数据构建器
pub struct BeanClassBuilder<T> {
    name: Option<String>,
    scope: ScopeKind,
    qualifier_sets: Vec<BTreeSet<Qualifier>>,
    injection_points: Vec<InjectionPoint>,
    observers: Vec<ObserverMethod>,
    constructor: Option<Constructor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanClassBuilder<T> {
    fn new() -> Self {
        Self {
            name: None,
            scope: ScopeKind::default(),
            qualifier_sets: Vec::new(),
            injection_points: Vec::new(),
            observers: Vec::new(),
            constructor: None,
            _marker: PhantomData,
        }
    }

    /// 设置作用域
    pub fn scope(mut self, scope: ScopeKind) -> Self {
        self.scope = scope;
        self
    }

    /// 声明一个限定符组合，每次调用产生一个额外的绑定
    pub fn qualified(mut self, qualifiers: impl IntoIterator<Item = Qualifier>) -> Self {
        self.qualifier_sets.push(qualifiers.into_iter().collect());
        self
    }

    /// 设置 Bean 名称，供按名称查找
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 声明注入点
    pub fn inject(mut self, point: InjectionPoint) -> Self {
        self.injection_points.push(point);
        self
    }

    /// 设置构造器
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move |deps: &Dependencies| {
            f(deps).map(|bean| Arc::new(bean) as Instance)
        }));
        self
    }

    /// 同步观察者方法
    pub fn observes<E, F>(self, qualifiers: impl IntoIterator<Item = Qualifier>, f: F) -> Self
    where
        E: Any + Send + Sync,
        F: Fn(&T, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.observer::<E, F>(qualifiers, false, f)
    }

    /// 异步观察者方法
    pub fn observes_async<E, F>(self, qualifiers: impl IntoIterator<Item = Qualifier>, f: F) -> Self
    where
        E: Any + Send + Sync,
        F: Fn(&T, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.observer::<E, F>(qualifiers, true, f)
    }

    fn observer<E, F>(
        mut self,
        qualifiers: impl IntoIterator<Item = Qualifier>,
        asynchronous: bool,
        f: F,
    ) -> Self
    where
        E: Any + Send + Sync,
        F: Fn(&T, &E) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.observers.push(ObserverMethod::method::<T, E, F>(
            Key::of::<T>(),
            qualifiers,
            asynchronous,
            f,
        ));
        self
    }

    /// 完成构建
    pub fn build(self) -> BeanClass {
        let type_key = TypeKey::of::<T>();
        let mut qualifier_sets = self.qualifier_sets;
        if qualifier_sets.is_empty() {
            qualifier_sets.push(BTreeSet::new());
        }
        let declaring = Key::new(type_key, qualifier_sets[0].iter().cloned());
        let observers = self
            .observers
            .into_iter()
            .map(|observer| observer.with_declaring(declaring.clone()))
            .collect();

        BeanClass {
            type_key,
            name: self.name,
            scope: self.scope,
            qualifier_sets,
            injection_points: Arc::new(self.injection_points),
            observers,
            constructor: self.constructor,
        }
    }
}

impl<T: Any + Send + Sync + Default> BeanClassBuilder<T> {
    /// 使用 `Default` 作为构造器
    pub fn default_constructor(self) -> Self {
        self.constructor(|_| Ok(T::default()))
    }
}

/// 自描述的 Bean 类型
pub trait Injectable: Any + Send + Sync + Sized {
    /// Bean 元数据
    fn bean_class() -> BeanClass;
}
