//! 配置属性注入
use config_abstractions::ConfigProperty;
use config_impl::OVERRIDE_ENV;
use di_abstractions::{BeanClass, Dependencies};
use infrastructure_common::{BoxError, ScopeKind};
use infrastructure_composition::EnvironmentBuilder;
use std::io::Write;

const BUNDLED: &str = "\
# 打包的默认配置
hello=world
pool.size=12
pool.ratio=0.75
pool.timeout=2.5
pool.enabled=true
pool.limit=not-a-number
";

#[derive(Debug)]
struct Settings {
    hello: String,
    fallback: String,
    missing: Option<String>,
    size: i32,
    ratio: f32,
    timeout: f64,
    enabled: bool,
    limit: u64,
}

fn settings_class() -> BeanClass {
    BeanClass::of::<Settings>()
        .scope(ScopeKind::Application)
        .inject(ConfigProperty::new("hello").point::<String>("hello"))
        .inject(
            ConfigProperty::new("nowhere.configured")
                .with_default("from-default")
                .point::<String>("fallback"),
        )
        .inject(ConfigProperty::new("nowhere.else").point::<String>("missing"))
        .inject(ConfigProperty::new("pool.size").point::<i32>("size"))
        .inject(ConfigProperty::new("pool.ratio").point::<f32>("ratio"))
        .inject(ConfigProperty::new("pool.timeout").point::<f64>("timeout"))
        .inject(ConfigProperty::new("pool.enabled").point::<bool>("enabled"))
        .inject(ConfigProperty::new("pool.limit").point::<u64>("limit"))
        .constructor(|deps: &Dependencies| -> Result<Settings, BoxError> {
            Ok(Settings {
                hello: deps.value("hello")?,
                fallback: deps.value("fallback")?,
                missing: deps.optional_value("missing")?,
                size: deps.value("size")?,
                ratio: deps.value("ratio")?,
                timeout: deps.value("timeout")?,
                enabled: deps.value("enabled")?,
                limit: deps.value("limit")?,
            })
        })
        .build()
}

#[test]
fn test_bundled_values_and_defaults() -> anyhow::Result<()> {
    let env = EnvironmentBuilder::new()
        .with_bundled_properties("app.properties", BUNDLED)
        .with_class(settings_class())
        .start()?;

    let settings = env.get::<Settings>()?;
    assert_eq!(settings.hello, "world");
    assert_eq!(settings.fallback, "from-default");
    assert!(settings.missing.is_none());
    assert_eq!(settings.size, 12);
    assert!((settings.ratio - 0.75).abs() < 1e-6);
    assert!((settings.timeout - 2.5).abs() < 1e-9);
    assert!(settings.enabled);
    assert_eq!(settings.limit, 0);

    env.stop()?;
    Ok(())
}

#[test]
fn test_override_file_takes_precedence() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "hello=worldoverride")?;
    writeln!(file, "pool.size=40")?;

    let env = EnvironmentBuilder::new()
        .with_bundled_properties("app.properties", BUNDLED)
        .with_override_file(file.path())
        .with_class(settings_class())
        .start()?;

    let settings = env.get::<Settings>()?;
    assert_eq!(settings.hello, "worldoverride");
    assert_eq!(settings.size, 40);
    assert!((settings.ratio - 0.75).abs() < 1e-6);

    env.stop()?;
    Ok(())
}

#[test]
fn test_override_file_from_environment_variable() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "hello=worldoverride")?;

    std::env::set_var(OVERRIDE_ENV, file.path());
    let built = EnvironmentBuilder::new()
        .with_bundled_properties("app.properties", BUNDLED)
        .with_override_from_env()
        .with_class(settings_class())
        .start();
    std::env::remove_var(OVERRIDE_ENV);

    let env = built?;
    assert_eq!(env.get::<Settings>()?.hello, "worldoverride");
    env.stop()?;
    Ok(())
}

#[derive(Debug)]
struct Unsupported {
    tags: Option<Vec<String>>,
}

#[test]
fn test_ill_formed_config_point_is_skipped() -> anyhow::Result<()> {
    let env = EnvironmentBuilder::new()
        .with_bundled_properties("app.properties", BUNDLED)
        .with_class(
            BeanClass::of::<Unsupported>()
                .inject(ConfigProperty::new("hello").point::<Vec<String>>("tags"))
                .constructor(|deps: &Dependencies| -> Result<Unsupported, BoxError> {
                    Ok(Unsupported {
                        tags: deps.optional_value("tags")?,
                    })
                })
                .build(),
        )
        .start()?;

    assert!(env.get::<Unsupported>()?.tags.is_none());
    env.stop()?;
    Ok(())
}
