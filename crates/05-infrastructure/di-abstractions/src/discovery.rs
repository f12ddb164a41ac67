//! Bean 发现目录
//!
//! `register_bean!` 在程序启动时把 [`Injectable`](crate::Injectable) 类型登记到
//! [`BEAN_CATALOG`]，清单解析时按完整类型名查找。

use crate::bean::BeanClass;
use infrastructure_common::Catalog;

/// 进程级 Bean 目录，以完整类型名为键
pub static BEAN_CATALOG: Catalog<BeanClass> = Catalog::new("bean");

/// 在程序启动时登记 Bean 类型
///
/// ```ignore
/// register_bean!(my_crate::services::Greeter);
/// ```
#[macro_export]
macro_rules! register_bean {
    ($($ty:ty),+ $(,)?) => {
        $(
            const _: () = {
                #[$crate::__private::ctor::ctor]
                fn register() {
                    $crate::BEAN_CATALOG.register(
                        ::std::any::type_name::<$ty>(),
                        <$ty as $crate::Injectable>::bean_class,
                    );
                }
            };
        )+
    };
}
