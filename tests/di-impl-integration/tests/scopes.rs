//! 作用域实例身份与并发首次解析
use di_abstractions::{BeanClass, Contextual, Dependencies, InjectionPoint};
use di_impl::Environment;
use infrastructure_common::{BoxError, DependencyError, Key, Qualifier, ScopeKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct Cart {
    items: AtomicUsize,
}

fn counted<T, F>(scope: ScopeKind, counter: Arc<AtomicUsize>, make: F) -> BeanClass
where
    T: Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    BeanClass::of::<T>()
        .scope(scope)
        .constructor(move |_: &Dependencies| -> Result<T, BoxError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(make())
        })
        .build()
}

#[derive(Debug)]
struct SlowService;

#[test]
fn test_singleton_identity() {
    let env = Environment::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    env.add([counted(ScopeKind::Singleton, constructed.clone(), || SlowService)]);

    let first = env.get::<SlowService>().unwrap();
    let second = env.get::<SlowService>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_first_resolution_constructs_once() {
    const THREADS: usize = 16;

    for scope in [ScopeKind::Singleton, ScopeKind::Application] {
        let env = Arc::new(Environment::new());
        let constructed = Arc::new(AtomicUsize::new(0));
        env.add([counted(scope, constructed.clone(), || {
            thread::sleep(Duration::from_millis(20));
            SlowService
        })]);

        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let env = Arc::clone(&env);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    env.get::<SlowService>().unwrap()
                })
            })
            .collect();

        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(constructed.load(Ordering::SeqCst), 1, "scope {}", scope);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}

#[test]
fn test_qualified_singleton_is_constructed_once() {
    for scope in [ScopeKind::Singleton, ScopeKind::Application] {
        let env = Environment::new();
        let constructed = Arc::new(AtomicUsize::new(0));
        let counter = constructed.clone();
        env.add([BeanClass::of::<SlowService>()
            .scope(scope)
            .qualified([Qualifier::named("a")])
            .qualified([Qualifier::named("b")])
            .constructor(move |_: &Dependencies| -> Result<SlowService, BoxError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(SlowService)
            })
            .build()]);

        let a = env.get_qualified::<SlowService>([Qualifier::named("a")]).unwrap();
        let b = env.get_qualified::<SlowService>([Qualifier::named("b")]).unwrap();

        assert!(Arc::ptr_eq(&a, &b), "scope {}", scope);
        assert_eq!(constructed.load(Ordering::SeqCst), 1, "scope {}", scope);
    }
}

#[test]
fn test_unscoped_creates_new_instances() {
    let env = Environment::new();
    let constructed = Arc::new(AtomicUsize::new(0));
    env.add([counted(ScopeKind::Unscoped, constructed.clone(), || SlowService)]);

    let first = env.get::<SlowService>().unwrap();
    let second = env.get::<SlowService>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

fn cart_env(scope: ScopeKind) -> Environment {
    let env = Environment::new();
    env.add([BeanClass::of::<Cart>()
        .scope(scope)
        .default_constructor()
        .build()]);
    env
}

#[test]
fn test_request_scope_identity() {
    let env = cart_env(ScopeKind::Request);
    let first_proxy: Contextual<Cart> = env.contextual([]).unwrap();
    let second_proxy: Contextual<Cart> = env.contextual([]).unwrap();

    let (a, b) = {
        let _request = env.begin_request();
        (first_proxy.get().unwrap(), second_proxy.get().unwrap())
    };
    assert!(Arc::ptr_eq(&a, &b));

    let c = {
        let _request = env.begin_request();
        first_proxy.get().unwrap()
    };
    assert!(!Arc::ptr_eq(&a, &c));

    assert!(matches!(
        first_proxy.get(),
        Err(DependencyError::NoActiveContext { .. })
    ));
}

#[test]
fn test_session_scope_identity() {
    let env = cart_env(ScopeKind::Session);
    let proxy: Contextual<Cart> = env.contextual([]).unwrap();

    let first = {
        let _session = env.associate_session("alice");
        proxy.with(|cart| cart.items.fetch_add(1, Ordering::SeqCst)).unwrap();
        proxy.get().unwrap()
    };
    let again = {
        let _session = env.associate_session("alice");
        proxy.get().unwrap()
    };
    let other = {
        let _session = env.associate_session("bob");
        proxy.get().unwrap()
    };

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(again.items.load(Ordering::SeqCst), 1);
    assert_eq!(other.items.load(Ordering::SeqCst), 0);

    assert!(env.destroy_session("alice"));
    let fresh = {
        let _session = env.associate_session("alice");
        proxy.get().unwrap()
    };
    assert!(!Arc::ptr_eq(&first, &fresh));
}

#[test]
fn test_is_mutable() {
    for (scope, mutable) in [
        (ScopeKind::Singleton, false),
        (ScopeKind::Application, false),
        (ScopeKind::Unscoped, false),
        (ScopeKind::Request, true),
        (ScopeKind::Session, true),
    ] {
        let env = cart_env(scope);
        assert_eq!(env.is_mutable(&Key::of::<Cart>()).unwrap(), mutable, "scope {}", scope);
    }

    let env = Environment::new();
    assert!(env.is_mutable(&Key::of::<Cart>()).is_err());
}

#[test]
fn test_contextual_rejects_shared_scopes() {
    let env = cart_env(ScopeKind::Singleton);
    assert!(matches!(
        env.contextual::<Cart>([]),
        Err(DependencyError::ScopeMismatch { .. })
    ));
}

#[derive(Debug)]
struct Checkout {
    cart: Contextual<Cart>,
}

#[test]
fn test_singleton_holds_request_proxy() {
    let env = cart_env(ScopeKind::Request);
    env.add([BeanClass::of::<Checkout>()
        .scope(ScopeKind::Singleton)
        .inject(InjectionPoint::of::<Cart>("cart"))
        .constructor(|deps: &Dependencies| -> Result<Checkout, BoxError> {
            Ok(Checkout {
                cart: deps.contextual("cart")?,
            })
        })
        .build()]);

    // 单例在请求之外创建，持有的是代理
    let checkout = env.get::<Checkout>().unwrap();

    let carts: Vec<_> = (0..2)
        .map(|_| {
            let _request = env.begin_request();
            checkout
                .cart
                .with(|cart| cart.items.fetch_add(1, Ordering::SeqCst))
                .unwrap();
            checkout.cart.get().unwrap()
        })
        .collect();

    assert!(!Arc::ptr_eq(&carts[0], &carts[1]));
    assert!(carts
        .iter()
        .all(|cart| cart.items.load(Ordering::SeqCst) == 1));
}

#[test]
fn test_requests_on_separate_threads_are_isolated() {
    let env = Arc::new(cart_env(ScopeKind::Request));

    let carts: Vec<_> = (0..4)
        .map(|_| {
            let env = Arc::clone(&env);
            thread::spawn(move || {
                let _request = env.begin_request();
                let first = env.get::<Cart>().unwrap();
                let second = env.get::<Cart>().unwrap();
                assert!(Arc::ptr_eq(&first, &second));
                first
            })
        })
        .map(|handle| handle.join().unwrap())
        .collect();

    for (i, a) in carts.iter().enumerate() {
        for b in &carts[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
}
