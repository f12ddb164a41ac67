//! 声明式事务传播
//!
//! [`TransactionInterceptor`] 按 [`Propagation`] 决定在调用前后开始、加入、挂起或拒绝事务。
//! 事务帧保存在线程本地栈中，进入时压栈、退出时出栈；`None` 帧表示挂起。
//!
//! 失败分为两类：
//! - panic 视为非受检失败：标记回滚，若本次调用拥有事务则回滚，然后原样重新抛出；
//! - 返回 `Err(e)` 视为受检失败：除非被豁免，否则标记回滚并包装为
//!   [`TransactionError::RolledBack`]；被豁免的错误以 [`TransactionError::Application`]
//!   原样返回，不强制回滚。调用失败后结束事务时的资源错误只记录日志，
//!   返回的仍是业务错误。

use crate::dispatch::panic_message;
use infrastructure_common::{BoxError, DependencyError, DependencyResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// 事务传播行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Propagation {
    /// 有事务则加入，否则开始新事务
    Required,
    /// 必须在事务中调用
    Mandatory,
    /// 不得在事务中调用
    Never,
    /// 挂起当前事务，非事务执行
    NotSupported,
    /// 总是开始新事务，挂起当前事务
    RequiresNew,
    /// 有事务则加入，否则非事务执行
    Supports,
}

impl Default for Propagation {
    fn default() -> Self {
        Self::Required
    }
}

/// 事务帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFrame {
    id: Uuid,
    propagation: Propagation,
    active: bool,
    marked_for_rollback: bool,
}

impl TransactionFrame {
    fn begin(propagation: Propagation) -> Self {
        Self {
            id: Uuid::new_v4(),
            propagation,
            active: true,
            marked_for_rollback: false,
        }
    }

    /// 事务标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 开始该事务的传播行为
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// 是否活动
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 是否已标记为只能回滚
    pub fn is_marked_for_rollback(&self) -> bool {
        self.marked_for_rollback
    }
}

/// 底层事务资源
pub trait TransactionResource: Send + Sync {
    /// 开始事务
    fn begin(&self, frame: &TransactionFrame) -> Result<(), BoxError>;

    /// 提交事务
    fn commit(&self, frame: &TransactionFrame) -> Result<(), BoxError>;

    /// 回滚事务
    fn rollback(&self, frame: &TransactionFrame) -> Result<(), BoxError>;
}

/// 事务错误
#[derive(Error, Debug)]
pub enum TransactionError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("需要活动事务，但当前没有事务")]
    TransactionRequired,

    #[error("事务状态非法: {message}")]
    IllegalState { message: String },

    #[error("事务已回滚: {source}")]
    RolledBack { source: E },

    #[error(transparent)]
    Application(E),

    #[error("事务资源操作失败: {source}")]
    Resource { source: BoxError },
}

impl<E> TransactionError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// 取出业务错误（回滚包装或豁免的业务错误）
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::RolledBack { source } | Self::Application(source) => Some(source),
            _ => None,
        }
    }
}

/// 事务结果类型别名
pub type TransactionResult<T, E> = Result<T, TransactionError<E>>;

static NEXT_INTERCEPTOR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static FRAMES: RefCell<HashMap<u64, Vec<Option<TransactionFrame>>>> =
        RefCell::new(HashMap::new());
}

/// 事务传播拦截器
#[derive(Clone)]
pub struct TransactionInterceptor {
    id: u64,
    resource: Arc<dyn TransactionResource>,
}

impl TransactionInterceptor {
    /// 创建拦截器
    pub fn new(resource: Arc<dyn TransactionResource>) -> Self {
        Self {
            id: NEXT_INTERCEPTOR_ID.fetch_add(1, Ordering::Relaxed),
            resource,
        }
    }

    /// 按传播行为执行调用，所有业务错误都触发回滚
    pub fn invoke<R, E, F>(&self, propagation: Propagation, f: F) -> TransactionResult<R, E>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Result<R, E>,
    {
        self.invoke_exempting(propagation, |_: &E| false, f)
    }

    /// 按传播行为执行调用，`is_application_error` 判定为真的错误不触发回滚
    pub fn invoke_exempting<R, E, F, X>(
        &self,
        propagation: Propagation,
        is_application_error: X,
        f: F,
    ) -> TransactionResult<R, E>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Result<R, E>,
        X: Fn(&E) -> bool,
    {
        let active = self.is_transaction_active();
        match (propagation, active) {
            (Propagation::Mandatory, false) => Err(TransactionError::TransactionRequired),
            (Propagation::Never, true) => Err(TransactionError::IllegalState {
                message: "当前存在活动事务，传播行为 Never 不允许执行".to_string(),
            }),
            (Propagation::Required | Propagation::Mandatory | Propagation::Supports, true) => {
                self.run_joined(is_application_error, f)
            }
            (Propagation::Required | Propagation::RequiresNew, _) => {
                self.run_owned(propagation, is_application_error, f)
            }
            (Propagation::NotSupported, true) => self.run_suspended(f),
            (Propagation::NotSupported | Propagation::Never | Propagation::Supports, false) => {
                f().map_err(TransactionError::Application)
            }
        }
    }

    fn run_owned<R, E, F, X>(
        &self,
        propagation: Propagation,
        is_application_error: X,
        f: F,
    ) -> TransactionResult<R, E>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Result<R, E>,
        X: Fn(&E) -> bool,
    {
        let frame = TransactionFrame::begin(propagation);
        self.resource
            .begin(&frame)
            .map_err(|source| TransactionError::Resource { source })?;
        debug!("开始事务: {} ({:?})", frame.id, propagation);

        self.push(Some(frame.clone()));
        let outcome = catch_unwind(AssertUnwindSafe(f));
        let frame = self.pop().flatten().unwrap_or(frame);

        match outcome {
            Err(payload) => {
                warn!(
                    "事务内发生 panic，回滚事务 {}: {}",
                    frame.id,
                    panic_message(payload.as_ref())
                );
                if let Err(e) = self.resource.rollback(&frame) {
                    error!("回滚事务失败: {}, 原因: {}", frame.id, e);
                }
                resume_unwind(payload)
            }
            Ok(Ok(value)) => {
                self.complete(&frame, !frame.marked_for_rollback)
                    .map_err(|source| TransactionError::Resource { source })?;
                Ok(value)
            }
            Ok(Err(e)) if is_application_error(&e) => {
                self.complete_quietly(&frame, !frame.marked_for_rollback);
                Err(TransactionError::Application(e))
            }
            Ok(Err(e)) => {
                self.complete_quietly(&frame, false);
                Err(TransactionError::RolledBack { source: e })
            }
        }
    }

    fn run_joined<R, E, F, X>(&self, is_application_error: X, f: F) -> TransactionResult<R, E>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Result<R, E>,
        X: Fn(&E) -> bool,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Err(payload) => {
                self.mark_current();
                resume_unwind(payload)
            }
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if is_application_error(&e) => Err(TransactionError::Application(e)),
            Ok(Err(e)) => {
                self.mark_current();
                Err(TransactionError::RolledBack { source: e })
            }
        }
    }

    fn run_suspended<R, E, F>(&self, f: F) -> TransactionResult<R, E>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Result<R, E>,
    {
        debug!("挂起当前事务");
        self.push(None);
        let outcome = catch_unwind(AssertUnwindSafe(f));
        self.pop();
        debug!("恢复被挂起的事务");

        match outcome {
            Err(payload) => resume_unwind(payload),
            Ok(result) => result.map_err(TransactionError::Application),
        }
    }

    fn complete(&self, frame: &TransactionFrame, commit: bool) -> Result<(), BoxError> {
        if commit {
            debug!("提交事务: {}", frame.id);
            self.resource.commit(frame)
        } else {
            debug!("回滚事务: {}", frame.id);
            self.resource.rollback(frame)
        }
    }

    // 调用已失败时结束事务，资源错误只记录日志，业务错误原样返回
    fn complete_quietly(&self, frame: &TransactionFrame, commit: bool) {
        if let Err(e) = self.complete(frame, commit) {
            error!("结束事务失败: {}, 原因: {}", frame.id, e);
        }
    }

    /// 当前线程上的活动事务帧
    pub fn current_frame(&self) -> Option<TransactionFrame> {
        self.with_stack(|stack| stack.last().cloned().flatten())
    }

    /// 当前线程是否有活动事务
    pub fn is_transaction_active(&self) -> bool {
        self.with_stack(|stack| matches!(stack.last(), Some(Some(_))))
    }

    /// 把当前事务标记为只能回滚
    pub fn set_rollback_only(&self) -> DependencyResult<()> {
        if self.mark_current() {
            Ok(())
        } else {
            Err(DependencyError::InvalidState {
                message: "当前线程没有活动事务".to_string(),
            })
        }
    }

    fn mark_current(&self) -> bool {
        self.with_stack(|stack| match stack.last_mut() {
            Some(Some(frame)) => {
                frame.marked_for_rollback = true;
                true
            }
            _ => false,
        })
    }

    fn push(&self, frame: Option<TransactionFrame>) {
        self.with_stack(|stack| stack.push(frame));
    }

    fn pop(&self) -> Option<Option<TransactionFrame>> {
        self.with_stack(Vec::pop)
    }

    fn with_stack<R>(&self, f: impl FnOnce(&mut Vec<Option<TransactionFrame>>) -> R) -> R {
        FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            let result = f(frames.entry(self.id).or_default());
            if frames.get(&self.id).is_some_and(Vec::is_empty) {
                frames.remove(&self.id);
            }
            result
        })
    }
}

impl std::fmt::Debug for TransactionInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionInterceptor")
            .field("id", &self.id)
            .finish()
    }
}
