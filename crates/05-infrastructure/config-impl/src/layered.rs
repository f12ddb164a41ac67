//! 分层配置
//!
//! 打包在程序内的 properties 文本作为底层，外部覆盖文件位于其上，
//! 同名键以覆盖文件为准。覆盖文件路径可以显式指定，也可以通过
//! [`OVERRIDE_ENV`] 环境变量给出。
//!
//! 键是扁平字符串，`db` 与 `db.url` 互不影响。按点路径组织的结构化视图
//! 只在 [`LayeredConfig::get_typed`] 中按需构建。

use crate::properties::PropertiesSource;
use config_abstractions::ConfigProvider;
use infrastructure_common::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// 指定覆盖文件路径的环境变量
pub const OVERRIDE_ENV: &str = "LORN_CONFIG_OVERRIDE";

/// 分层配置
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    values: BTreeMap<String, String>,
    layers: Vec<PropertiesSource>,
    sources: Vec<String>,
}

impl LayeredConfig {
    /// 创建构建器
    pub fn builder() -> LayeredConfigBuilder {
        LayeredConfigBuilder::default()
    }

    /// 只包含打包配置的分层配置
    pub fn from_bundled(origin: impl Into<String>, text: &str) -> ConfigResult<Self> {
        Self::builder().bundled(origin, text).build()
    }

    /// 读取 [`OVERRIDE_ENV`] 环境变量给出的覆盖文件路径
    pub fn override_path_from_env() -> Option<PathBuf> {
        std::env::var_os(OVERRIDE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    /// 按层叠加顺序排列的来源名称
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// 以点路径读取并反序列化为指定类型
    ///
    /// 结构化视图中，同时出现 `db` 与 `db.*` 时前者会被子表遮蔽，
    /// 这类键请用 [`ConfigProvider::get`] 读取。
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        let key = key.to_lowercase();
        let config = self
            .layers
            .iter()
            .cloned()
            .fold(config::Config::builder(), |builder, layer| {
                builder.add_source(layer)
            })
            .build()
            .map_err(|e| {
                error!("配置结构化视图构建失败: {}", e);
                ConfigError::ParseError {
                    source: Box::new(e),
                }
            })?;

        config.get::<T>(&key).map_err(|e| match e {
            config::ConfigError::NotFound(_) => ConfigError::KeyNotFound { key },
            other => ConfigError::TypeConversionError {
                message: other.to_string(),
            },
        })
    }
}

impl ConfigProvider for LayeredConfig {
    fn name(&self) -> &str {
        "layered-properties"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(&key.to_lowercase()).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_lowercase())
    }
}

/// 分层配置构建器
#[derive(Debug, Default)]
pub struct LayeredConfigBuilder {
    layers: Vec<PropertiesSource>,
    override_file: Option<PathBuf>,
}

impl LayeredConfigBuilder {
    /// 添加打包的 properties 文本，后添加的层优先
    pub fn bundled(mut self, origin: impl Into<String>, text: &str) -> Self {
        self.layers.push(PropertiesSource::parse(origin, text));
        self
    }

    /// 指定覆盖文件
    pub fn override_file(mut self, path: impl AsRef<Path>) -> Self {
        self.override_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// 从环境变量读取覆盖文件，未设置时保持不变
    pub fn override_from_env(mut self) -> Self {
        if let Some(path) = LayeredConfig::override_path_from_env() {
            self.override_file = Some(path);
        }
        self
    }

    /// 构建分层配置
    ///
    /// 指定的覆盖文件不存在时返回 [`ConfigError::FileNotFound`]。
    pub fn build(self) -> ConfigResult<LayeredConfig> {
        let mut layers = self.layers;

        if let Some(path) = &self.override_file {
            if !path.exists() {
                error!("配置覆盖文件不存在: {}", path.display());
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            let text = std::fs::read_to_string(path)?;
            info!("加载配置覆盖文件: {}", path.display());
            layers.push(PropertiesSource::parse(path.display().to_string(), &text));
        }

        let mut values = BTreeMap::new();
        let mut sources = Vec::with_capacity(layers.len());
        for layer in &layers {
            values.extend(layer.entries().iter().cloned());
            sources.push(layer.origin().to_string());
        }
        debug!("分层配置构建完成: sources={:?}, keys={}", sources, values.len());

        Ok(LayeredConfig {
            values,
            layers,
            sources,
        })
    }
}
