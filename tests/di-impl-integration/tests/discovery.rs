//! 启动期注册：清单解析 Bean 与扩展自动发现
use di_abstractions::{register_bean, BeanClass, Injectable};
use di_impl::{register_extension, ClassManifest, Environment, Extension};
use infrastructure_common::{BoxError, LifecycleState, ScopeKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Greeter;

impl Greeter {
    fn greet(&self, name: &str) -> String {
        format!("hello, {}", name)
    }
}

impl Injectable for Greeter {
    fn bean_class() -> BeanClass {
        BeanClass::of::<Self>()
            .scope(ScopeKind::Singleton)
            .named("greeter")
            .default_constructor()
            .build()
    }
}

register_bean!(Greeter);

/// 扩展启动时绑定的审计日志
#[derive(Debug, Default)]
struct AuditLog {
    starts: AtomicUsize,
}

static STOPS: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct AuditExtension;

impl Extension for AuditExtension {
    fn do_start(&self, environment: &Environment) -> Result<(), BoxError> {
        let log = environment.bind(AuditLog::default());
        log.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn do_stop(&self, _environment: &Environment) -> Result<(), BoxError> {
        STOPS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

register_extension!(AuditExtension);

#[test]
fn test_manifest_and_discovered_extension() -> anyhow::Result<()> {
    let env = Environment::new();
    env.add_manifest(ClassManifest::parse(
        "inline",
        &format!("# beans\n{}\nmissing::Type\n", std::any::type_name::<Greeter>()),
    ));

    assert!(env.try_get::<Greeter>()?.is_none());
    env.start()?;
    assert_eq!(env.state(), LifecycleState::Running);

    let greeter = env.get::<Greeter>()?;
    assert_eq!(greeter.greet("lorn"), "hello, lorn");
    assert!(env.find_as::<Greeter>("greeter")?.is_some());

    let log: Arc<AuditLog> = env.get()?;
    assert_eq!(log.starts.load(Ordering::SeqCst), 1);

    let stops_before = STOPS.load(Ordering::SeqCst);
    env.stop()?;
    assert_eq!(STOPS.load(Ordering::SeqCst), stops_before + 1);
    assert_eq!(env.state(), LifecycleState::Stopped);
    Ok(())
}

#[test]
fn test_discovery_can_be_disabled() -> anyhow::Result<()> {
    let env = Environment::with_config(
        di_impl::EnvironmentConfig::default().with_discover_extensions(false),
    );
    env.start()?;

    assert!(env.try_get::<AuditLog>()?.is_none());
    env.stop()?;
    Ok(())
}
