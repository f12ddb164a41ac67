//! 运行时构建器

use crate::extensions::{ConfigExtension, ResolverRegistrationExtension, TransactionExtension};
use config_impl::LayeredConfig;
use di_abstractions::{AttributeResolverHost, BeanClass, SessionIdProvider};
use di_impl::{ClassManifest, Environment, EnvironmentConfig, Extension, TransactionResource};
use infrastructure_common::InfrastructureResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// 运行时构建器
///
/// 把配置、事务、按名称解析和用户扩展组装成一个 [`Environment`]。
#[derive(Default)]
pub struct EnvironmentBuilder {
    config: EnvironmentConfig,
    bundled: Vec<(String, String)>,
    override_file: Option<PathBuf>,
    override_from_env: bool,
    classes: Vec<BeanClass>,
    manifests: Vec<ClassManifest>,
    extensions: Vec<Arc<dyn Extension>>,
    transaction_resource: Option<Arc<dyn TransactionResource>>,
    attribute_hosts: Vec<Arc<dyn AttributeResolverHost>>,
    session_provider: Option<Arc<dyn SessionIdProvider>>,
}

impl EnvironmentBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 运行时配置
    pub fn with_config(mut self, config: EnvironmentConfig) -> Self {
        self.config = config;
        self
    }

    /// 添加打包的 properties 配置
    pub fn with_bundled_properties(
        mut self,
        origin: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.bundled.push((origin.into(), text.into()));
        self
    }

    /// 指定配置覆盖文件
    pub fn with_override_file(mut self, path: impl AsRef<Path>) -> Self {
        self.override_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// 允许通过环境变量指定配置覆盖文件
    pub fn with_override_from_env(mut self) -> Self {
        self.override_from_env = true;
        self
    }

    /// 注册 Bean
    pub fn with_class(mut self, class: BeanClass) -> Self {
        self.classes.push(class);
        self
    }

    /// 添加 Bean 清单
    pub fn with_manifest(mut self, manifest: ClassManifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    /// 添加扩展
    pub fn with_extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// 启用事务拦截器
    pub fn with_transaction_resource(mut self, resource: Arc<dyn TransactionResource>) -> Self {
        self.transaction_resource = Some(resource);
        self
    }

    /// 向属性解析宿主注册按名称解析器
    pub fn with_attribute_host(mut self, host: Arc<dyn AttributeResolverHost>) -> Self {
        self.attribute_hosts.push(host);
        self
    }

    /// 外部会话标识提供者
    pub fn with_session_provider(mut self, provider: Arc<dyn SessionIdProvider>) -> Self {
        self.session_provider = Some(provider);
        self
    }

    /// 构建运行时，不启动
    pub fn build(self) -> InfrastructureResult<Environment> {
        let mut layered = LayeredConfig::builder();
        for (origin, text) in &self.bundled {
            layered = layered.bundled(origin.clone(), text);
        }
        if self.override_from_env {
            layered = layered.override_from_env();
        }
        if let Some(path) = &self.override_file {
            layered = layered.override_file(path);
        }
        let layered = layered.build()?;

        let environment = Environment::with_config(self.config);
        environment.add_extension(Arc::new(ConfigExtension::new(layered)));
        if let Some(resource) = self.transaction_resource {
            environment.add_extension(Arc::new(TransactionExtension::new(resource)));
        }
        if !self.attribute_hosts.is_empty() {
            environment.add_extension(Arc::new(ResolverRegistrationExtension::new(
                self.attribute_hosts,
            )));
        }
        for extension in self.extensions {
            debug!("添加扩展: {}", extension.name());
            environment.add_extension(extension);
        }
        for manifest in self.manifests {
            environment.add_manifest(manifest);
        }
        if let Some(provider) = self.session_provider {
            environment.set_session_provider(provider);
        }
        let added = environment.add(self.classes);

        info!("运行时构建完成: {} 个 Bean", added);
        Ok(environment)
    }

    /// 构建并启动运行时
    pub fn start(self) -> InfrastructureResult<Environment> {
        let environment = self.build()?;
        environment.start()?;
        Ok(environment)
    }
}

impl std::fmt::Debug for EnvironmentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentBuilder")
            .field("config", &self.config)
            .field("bundled", &self.bundled.len())
            .field("override_file", &self.override_file)
            .field("classes", &self.classes.len())
            .field("manifests", &self.manifests.len())
            .field("extensions", &self.extensions.len())
            .field("transactions", &self.transaction_resource.is_some())
            .finish()
    }
}
