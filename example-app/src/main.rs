//! # 示例应用程序
//!
//! 演示配置注入、作用域代理、事件分发和事务传播。

use anyhow::Context;
use clap::Parser;
use config_abstractions::ConfigProperty;
use di_abstractions::{BeanClass, Contextual, Dependencies, InjectionPoint};
use di_impl::{Propagation, TransactionFrame, TransactionInterceptor, TransactionResource};
use infrastructure_common::{BoxError, Qualifier, ScopeKind};
use infrastructure_composition::{init_tracing, EnvironmentBuilder, LoggingConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const BUNDLED: &str = "\
app.name=lorn-demo
greeting.template=hello
checkout.max-items=3
";

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "Lorn DI 运行时示例应用")]
struct Args {
    /// 配置覆盖文件路径，未指定时读取 LORN_CONFIG_OVERRIDE
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 模拟的请求数量
    #[arg(long, default_value_t = 3)]
    requests: usize,

    /// 使用开发环境日志配置
    #[arg(long)]
    verbose: bool,

    /// 输出 JSON 格式日志
    #[arg(long)]
    json_logs: bool,
}

/// 应用设置
#[derive(Debug)]
struct AppSettings {
    name: String,
    template: String,
    max_items: usize,
}

/// 请求内的购物车
#[derive(Debug, Default)]
struct Cart {
    items: Mutex<Vec<String>>,
}

/// 下单事件
#[derive(Debug)]
struct OrderPlaced {
    request: usize,
    items: usize,
}

/// 结账服务，单例持有购物车代理
#[derive(Debug)]
struct Checkout {
    settings: Arc<AppSettings>,
    cart: Contextual<Cart>,
    transactions: Arc<TransactionInterceptor>,
}

impl Checkout {
    fn add(&self, item: &str) -> Result<(), BoxError> {
        let max_items = self.settings.max_items;
        self.cart.with(|cart: &Cart| -> Result<(), BoxError> {
            let mut items = cart.items.lock().map_err(|e| e.to_string())?;
            if items.len() >= max_items {
                return Err(format!("购物车已满: 最多 {} 件", max_items).into());
            }
            items.push(item.to_string());
            Ok(())
        })?
    }

    fn place(&self) -> Result<usize, BoxError> {
        let count = self
            .transactions
            .invoke::<usize, BoxedError, _>(Propagation::Required, || {
                let items = self
                    .cart
                    .with(|cart| cart.items.lock().map(|items| items.len()).unwrap_or(0))
                    .map_err(|e| BoxedError(e.into()))?;
                if items == 0 {
                    return Err(BoxedError("购物车为空".into()));
                }
                Ok(items)
            })?;
        Ok(count)
    }
}

/// 把 `BoxError` 包装为具体错误类型，供事务拦截器使用
#[derive(Debug)]
struct BoxedError(BoxError);

impl std::fmt::Display for BoxedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for BoxedError {}

/// 只记录事务边界的事务资源
#[derive(Debug, Default)]
struct LoggingResource {
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl TransactionResource for LoggingResource {
    fn begin(&self, frame: &TransactionFrame) -> Result<(), BoxError> {
        info!("开始事务 {}", frame.id());
        Ok(())
    }

    fn commit(&self, frame: &TransactionFrame) -> Result<(), BoxError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        info!("提交事务 {}", frame.id());
        Ok(())
    }

    fn rollback(&self, frame: &TransactionFrame) -> Result<(), BoxError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        warn!("回滚事务 {}", frame.id());
        Ok(())
    }
}

fn beans() -> Vec<BeanClass> {
    vec![
        BeanClass::of::<AppSettings>()
            .scope(ScopeKind::Application)
            .inject(ConfigProperty::new("app.name").point::<String>("name"))
            .inject(
                ConfigProperty::new("greeting.template")
                    .with_default("hi")
                    .point::<String>("template"),
            )
            .inject(
                ConfigProperty::new("checkout.max-items")
                    .with_default("5")
                    .point::<usize>("max_items"),
            )
            .constructor(|deps: &Dependencies| -> Result<AppSettings, BoxError> {
                Ok(AppSettings {
                    name: deps.value("name")?,
                    template: deps.value("template")?,
                    max_items: deps.value("max_items")?,
                })
            })
            .build(),
        BeanClass::of::<Cart>()
            .scope(ScopeKind::Request)
            .default_constructor()
            .build(),
        BeanClass::of::<Checkout>()
            .scope(ScopeKind::Singleton)
            .named("checkout")
            .inject(InjectionPoint::of::<AppSettings>("settings"))
            .inject(InjectionPoint::of::<Cart>("cart"))
            .inject(InjectionPoint::of::<TransactionInterceptor>("transactions"))
            .constructor(|deps: &Dependencies| -> Result<Checkout, BoxError> {
                Ok(Checkout {
                    settings: deps.get("settings")?,
                    cart: deps.contextual("cart")?,
                    transactions: deps.get("transactions")?,
                })
            })
            .build(),
    ]
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logging = if args.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    logging.json_format = args.json_logs;
    init_tracing(&logging)?;

    let resource = Arc::new(LoggingResource::default());
    let mut builder = EnvironmentBuilder::new()
        .with_bundled_properties("app.properties", BUNDLED)
        .with_transaction_resource(resource.clone());
    builder = match &args.config {
        Some(path) => builder.with_override_file(path),
        None => builder.with_override_from_env(),
    };
    for class in beans() {
        builder = builder.with_class(class);
    }
    let env = builder.start().context("运行时启动失败")?;

    let settings = env.get::<AppSettings>()?;
    info!("{}, {}!", settings.template, settings.name);

    let placed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&placed);
    env.observe([], move |event: &OrderPlaced| -> Result<(), BoxError> {
        counter.fetch_add(event.items, Ordering::SeqCst);
        Ok(())
    });
    env.observe_async(
        [Qualifier::new("Audit")],
        |event: &OrderPlaced| -> Result<(), BoxError> {
            info!("审计: 请求 {} 下单 {} 件", event.request, event.items);
            Ok(())
        },
    );

    let checkout = env.get::<Checkout>()?;
    for request in 0..args.requests {
        let _scope = env.begin_request();
        for item in 0..=request {
            if let Err(e) = checkout.add(&format!("item-{}", item)) {
                warn!("请求 {} 添加商品失败: {}", request, e);
            }
        }
        match checkout.place() {
            Ok(items) => {
                let event = OrderPlaced { request, items };
                env.fire_qualified(event, [Qualifier::new("Audit")])?;
                env.fire(OrderPlaced { request, items })?;
            }
            Err(e) => warn!("请求 {} 下单失败: {}", request, e),
        }
    }

    info!(
        "共下单 {} 件商品, 提交 {} 次, 回滚 {} 次",
        placed.load(Ordering::SeqCst),
        resource.commits.load(Ordering::SeqCst),
        resource.rollbacks.load(Ordering::SeqCst)
    );

    env.stop()?;
    Ok(())
}
