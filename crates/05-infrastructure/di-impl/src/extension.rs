//! 扩展生命周期
//!
//! 扩展在 [`Environment::start`](crate::Environment::start) 时按顺序启动，
//! 在 [`Environment::stop`](crate::Environment::stop) 时按相反顺序停止。

use crate::environment::Environment;
use infrastructure_common::{BoxError, Catalog};
use std::sync::Arc;

/// 运行时扩展
pub trait Extension: Send + Sync {
    /// 扩展名称
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 启动扩展，可以注册绑定、观察者或注入点构建器
    fn do_start(&self, environment: &Environment) -> Result<(), BoxError>;

    /// 停止扩展
    fn do_stop(&self, _environment: &Environment) -> Result<(), BoxError> {
        Ok(())
    }
}

/// 进程级扩展目录
pub static EXTENSION_CATALOG: Catalog<Arc<dyn Extension>> = Catalog::new("extension");

/// 在程序启动时登记扩展，扩展类型需要实现 `Default`
///
/// ```ignore
/// register_extension!(my_crate::AuditExtension);
/// ```
#[macro_export]
macro_rules! register_extension {
    ($($ty:ty),+ $(,)?) => {
        $(
            const _: () = {
                fn provide() -> ::std::sync::Arc<dyn $crate::Extension> {
                    ::std::sync::Arc::new(<$ty as ::std::default::Default>::default())
                }

                #[$crate::__private::ctor::ctor]
                fn register() {
                    $crate::EXTENSION_CATALOG.register(::std::any::type_name::<$ty>(), provide);
                }
            };
        )+
    };
}
