//! Bean 清单
//!
//! 清单是 UTF-8 文本，每行一个完整类型名，`#` 开头的行和空行被忽略。
//! 类型名通过 [`BEAN_CATALOG`] 解析为 Bean 元数据。

use di_abstractions::{BeanClass, BEAN_CATALOG};
use infrastructure_common::{ConfigError, ConfigResult};
use std::path::Path;
use tracing::{debug, warn};

/// Bean 清单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassManifest {
    source: String,
    names: Vec<String>,
}

impl ClassManifest {
    /// 解析清单文本
    pub fn parse(source: impl Into<String>, text: &str) -> Self {
        let names = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self {
            source: source.into(),
            names,
        }
    }

    /// 从文件读取清单
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(path.display().to_string(), &text))
    }

    /// 清单来源
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 清单中的类型名
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 解析清单中的类型，无法解析的类型记录日志后跳过
    pub fn resolve(&self) -> Vec<BeanClass> {
        self.names
            .iter()
            .filter_map(|name| match BEAN_CATALOG.lookup(name) {
                Some(entry) => {
                    debug!("清单 {} 解析类型: {}", self.source, name);
                    Some((entry.provider)())
                }
                None => {
                    warn!("清单 {} 中的类型无法解析，已跳过: {}", self.source, name);
                    None
                }
            })
            .collect()
    }
}
