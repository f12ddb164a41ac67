//! 绑定键相等性与限定符解析
use di_abstractions::{BeanClass, Dependencies};
use di_impl::Environment;
use infrastructure_common::{BoxError, DependencyError, Key, Qualifier, ScopeKind};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug)]
struct Datasource {
    url: &'static str,
}

fn primary() -> Qualifier {
    Qualifier::new("Primary")
}

fn region(value: &str) -> Qualifier {
    Qualifier::new("Region").with_member("value", value)
}

#[test]
fn test_key_equality_ignores_qualifier_order() {
    let declared = Key::qualified::<Datasource>([primary(), region("eu")]);
    let requested = Key::of::<Datasource>()
        .with_qualifier(region("eu"))
        .with_qualifier(primary());

    assert_eq!(declared, requested);
    assert_ne!(declared, Key::qualified::<Datasource>([primary(), region("us")]));
    assert_ne!(declared, Key::qualified::<String>([primary(), region("eu")]));
    assert_ne!(Key::of::<Datasource>(), Key::qualified::<Datasource>([primary()]));
}

#[test]
fn test_qualifier_equality_compares_members() {
    let a = Qualifier::new("Region")
        .with_member("value", "eu")
        .with_member("zone", "1");
    let b = Qualifier::new("Region")
        .with_member("zone", "1")
        .with_member("value", "eu");

    assert_eq!(a, b);
    assert_ne!(a, region("eu"));
    assert_eq!(Qualifier::named("main"), Qualifier::new("Named").with_member("value", "main"));
}

#[test]
fn test_qualified_binding_resolution() {
    let env = Environment::new();
    let default = env.bind(Datasource { url: "default" });
    let eu = env.bind_qualified(Arc::new(Datasource { url: "eu" }), [region("eu")]);

    let resolved = env.get_qualified::<Datasource>([region("eu")]).unwrap();
    assert!(Arc::ptr_eq(&resolved, &eu));

    assert!(matches!(
        env.get_qualified::<Datasource>([region("us")]),
        Err(DependencyError::Unresolved { .. })
    ));

    let unqualified = env.get::<Datasource>().unwrap();
    assert!(Arc::ptr_eq(&unqualified, &default));
    assert_eq!(unqualified.url, "default");
}

#[test]
fn test_qualified_lookup_without_default_binding() {
    let env = Environment::new();
    env.bind_qualified(Arc::new(Datasource { url: "eu" }), [region("eu")]);

    assert!(env.try_get::<Datasource>().unwrap().is_none());
}

#[test]
fn test_bean_with_several_qualifier_sets() {
    let env = Environment::new();
    env.add([BeanClass::of::<Datasource>()
        .scope(ScopeKind::Singleton)
        .qualified([primary()])
        .qualified([region("eu"), primary()])
        .constructor(|_: &Dependencies| -> Result<Datasource, BoxError> {
            Ok(Datasource { url: "shared" })
        })
        .build()]);

    assert_eq!(env.get_qualified::<Datasource>([primary()]).unwrap().url, "shared");
    assert_eq!(
        env.get_qualified::<Datasource>([primary(), region("eu")])
            .unwrap()
            .url,
        "shared"
    );
    assert!(env.get::<Datasource>().is_err());
}

#[derive(Debug)]
struct Repository {
    datasource: Arc<Datasource>,
}

fn repository_class(scope: ScopeKind) -> BeanClass {
    BeanClass::of::<Repository>()
        .scope(scope)
        .inject(di_abstractions::InjectionPoint::of::<Datasource>("datasource"))
        .constructor(|deps: &Dependencies| -> Result<Repository, BoxError> {
            Ok(Repository {
                datasource: deps.get("datasource")?,
            })
        })
        .build()
}

#[test]
fn test_qualified_injection_point() {
    let env = Environment::new();
    env.bind(Datasource { url: "default" });
    env.bind_qualified(Arc::new(Datasource { url: "eu" }), [region("eu")]);
    env.add([BeanClass::of::<Repository>()
        .inject(
            di_abstractions::InjectionPoint::of::<Datasource>("datasource")
                .qualified(region("eu")),
        )
        .constructor(|deps: &Dependencies| -> Result<Repository, BoxError> {
            Ok(Repository {
                datasource: deps.get("datasource")?,
            })
        })
        .build()]);

    assert_eq!(env.get::<Repository>().unwrap().datasource.url, "eu");
}

#[test]
fn test_unbind_removes_instance() {
    let env = Environment::new();
    let bound = env.bind(Datasource { url: "default" });

    assert!(env.unbind(&bound));
    assert!(env.try_get::<Datasource>().unwrap().is_none());
    assert!(!env.unbind(&bound));
}

#[test]
fn test_concurrent_registration_keeps_bindings_whole() {
    const WRITERS: usize = 3;
    const READERS: usize = 6;
    const ROUNDS: usize = 200;

    let env = Arc::new(Environment::new());
    env.bind(Datasource { url: "default" });
    let barrier = Arc::new(Barrier::new(WRITERS + READERS));

    let writers: Vec<_> = (0..WRITERS)
        .map(|index| {
            let env = Arc::clone(&env);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    if index == 0 {
                        let bound =
                            env.bind_qualified(Arc::new(Datasource { url: "eu" }), [region("eu")]);
                        env.unbind(&bound);
                    } else {
                        env.add([repository_class(ScopeKind::Singleton)]);
                        env.remove_class::<Repository>();
                    }
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let env = Arc::clone(&env);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    match env.get::<Repository>() {
                        Ok(repository) => assert_eq!(repository.datasource.url, "default"),
                        Err(DependencyError::Unresolved { .. }) => {}
                        Err(e) => panic!("unexpected resolution error: {e}"),
                    }
                    match env.get_qualified::<Datasource>([region("eu")]) {
                        Ok(datasource) => assert_eq!(datasource.url, "eu"),
                        Err(DependencyError::Unresolved { .. }) => {}
                        Err(e) => panic!("unexpected resolution error: {e}"),
                    }
                    assert!(env.try_get::<Repository>().is_ok());
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }
    assert_eq!(env.get::<Datasource>().unwrap().url, "default");
}
