//! 内置扩展
//!
//! - [`ConfigExtension`] 注册配置属性注入点构建器并绑定分层配置
//! - [`TransactionExtension`] 绑定事务拦截器
//! - [`ResolverRegistrationExtension`] 向外部属性解析宿主注册按名称解析器

use config_abstractions::{ConfigProvider, CONFIG_PROPERTY_MARKER};
use config_impl::{ConfigValueBuilder, LayeredConfig};
use di_abstractions::{AttributeResolverHost, InjectionPointBuilder};
use di_impl::{Environment, Extension, TransactionInterceptor, TransactionResource};
use infrastructure_common::BoxError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 配置扩展
#[derive(Debug, Clone)]
pub struct ConfigExtension {
    config: Arc<LayeredConfig>,
    builder: ConfigValueBuilder,
}

impl ConfigExtension {
    /// 基于分层配置创建
    pub fn new(config: LayeredConfig) -> Self {
        let config = Arc::new(config);
        let provider: Arc<dyn ConfigProvider> = config.clone();
        Self {
            builder: ConfigValueBuilder::new(provider),
            config,
        }
    }

    /// 分层配置
    pub fn config(&self) -> &Arc<LayeredConfig> {
        &self.config
    }
}

impl Extension for ConfigExtension {
    fn name(&self) -> &str {
        "config"
    }

    fn do_start(&self, environment: &Environment) -> Result<(), BoxError> {
        environment.bind_arc(self.config.clone());
        environment.register_injection_point_builder(Arc::new(self.builder.clone()));

        let mut checked = 0usize;
        for (owner, point) in environment.injection_points() {
            if point.marker().map(|marker| marker.name()) != Some(CONFIG_PROPERTY_MARKER) {
                continue;
            }
            checked += 1;
            if let Err(reason) = self.builder.validate(&point) {
                warn!("配置注入点格式错误，已忽略: {}.{}: {}", owner, point.field(), reason);
            }
        }
        info!(
            "配置扩展已启动: sources={:?}, 配置注入点 {} 个",
            self.config.sources(),
            checked
        );
        Ok(())
    }

    fn do_stop(&self, environment: &Environment) -> Result<(), BoxError> {
        environment.unbind(&self.config);
        Ok(())
    }
}

/// 事务扩展
#[derive(Debug, Clone)]
pub struct TransactionExtension {
    interceptor: Arc<TransactionInterceptor>,
}

impl TransactionExtension {
    /// 基于事务资源创建
    pub fn new(resource: Arc<dyn TransactionResource>) -> Self {
        Self {
            interceptor: Arc::new(TransactionInterceptor::new(resource)),
        }
    }

    /// 事务拦截器
    pub fn interceptor(&self) -> &Arc<TransactionInterceptor> {
        &self.interceptor
    }
}

impl Extension for TransactionExtension {
    fn name(&self) -> &str {
        "transaction"
    }

    fn do_start(&self, environment: &Environment) -> Result<(), BoxError> {
        environment.bind_arc(self.interceptor.clone());
        debug!("事务拦截器已绑定");
        Ok(())
    }

    fn do_stop(&self, environment: &Environment) -> Result<(), BoxError> {
        environment.unbind(&self.interceptor);
        Ok(())
    }
}

/// 按名称解析器注册扩展
#[derive(Default)]
pub struct ResolverRegistrationExtension {
    hosts: Vec<Arc<dyn AttributeResolverHost>>,
}

impl ResolverRegistrationExtension {
    /// 创建扩展
    pub fn new(hosts: Vec<Arc<dyn AttributeResolverHost>>) -> Self {
        Self { hosts }
    }

    /// 追加属性解析宿主
    pub fn with_host(mut self, host: Arc<dyn AttributeResolverHost>) -> Self {
        self.hosts.push(host);
        self
    }
}

impl Extension for ResolverRegistrationExtension {
    fn name(&self) -> &str {
        "resolver-registration"
    }

    fn do_start(&self, environment: &Environment) -> Result<(), BoxError> {
        for host in &self.hosts {
            host.add_resolver(environment.name_resolver());
        }
        debug!("已向 {} 个属性解析宿主注册解析器", self.hosts.len());
        Ok(())
    }
}

impl std::fmt::Debug for ResolverRegistrationExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistrationExtension")
            .field("hosts", &self.hosts.len())
            .finish()
    }
}
