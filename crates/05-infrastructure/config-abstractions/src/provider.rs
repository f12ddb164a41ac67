//! 配置提供者接口

use std::collections::BTreeMap;

/// 配置提供者
///
/// 以扁平的点分键暴露字符串值，键不区分大小写。
pub trait ConfigProvider: Send + Sync {
    /// 提供者名称
    fn name(&self) -> &str;

    /// 获取配置值
    fn get(&self, key: &str) -> Option<String>;

    /// 全部配置键
    fn keys(&self) -> Vec<String>;

    /// 是否存在配置键
    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 获取配置值，不存在时返回默认值
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// 提供者优先级，数值越大越优先
    fn priority(&self) -> i32 {
        0
    }

    /// 导出全部键值
    fn snapshot(&self) -> BTreeMap<String, String> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect()
    }
}
