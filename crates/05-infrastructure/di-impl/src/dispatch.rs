//! 异步事件分发池
//!
//! 固定数量的工作线程消费一个有界队列。队列满时提交方阻塞等待；
//! 若提交方本身就是分发线程，则直接在当前线程执行，避免线程池自锁。

use crossbeam_channel::{bounded, Sender, TrySendError};
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::Mutex;
use std::any::Any;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

/// 分发任务
pub type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_POOL: Cell<u64> = Cell::new(0);
}

struct PoolState {
    sender: Sender<Job>,
    handles: Vec<JoinHandle<()>>,
}

/// 异步事件分发池
pub struct DispatchPool {
    id: u64,
    workers: usize,
    capacity: usize,
    state: Mutex<Option<PoolState>>,
}

impl DispatchPool {
    /// 创建分发池，工作线程在第一次提交时启动
    pub fn new(workers: usize, capacity: usize) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            workers: workers.max(1),
            capacity: capacity.max(1),
            state: Mutex::new(None),
        }
    }

    /// 工作线程数量
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 队列容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前线程是否为本池的工作线程
    pub fn is_worker_thread(&self) -> bool {
        CURRENT_POOL.with(Cell::get) == self.id
    }

    /// 提交任务
    pub fn submit(&self, job: Job) -> DependencyResult<()> {
        let sender = self.sender()?;
        if self.is_worker_thread() {
            return match sender.try_send(job) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(job)) => {
                    debug!("分发队列已满，在当前工作线程内执行");
                    run_job(job);
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err(closed()),
            };
        }
        sender.send(job).map_err(|_| closed())
    }

    fn sender(&self) -> DependencyResult<Sender<Job>> {
        let mut state = self.state.lock();
        if let Some(state) = state.as_ref() {
            return Ok(state.sender.clone());
        }

        let (sender, receiver) = bounded::<Job>(self.capacity);
        let mut handles = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let receiver = receiver.clone();
            let pool_id = self.id;
            let handle = std::thread::Builder::new()
                .name(format!("event-dispatch-{}", index))
                .spawn(move || {
                    CURRENT_POOL.with(|current| current.set(pool_id));
                    for job in receiver.iter() {
                        run_job(job);
                    }
                })
                .map_err(|e| DependencyError::InvalidState {
                    message: format!("无法启动事件分发线程: {}", e),
                })?;
            handles.push(handle);
        }
        debug!(
            "事件分发池已启动: {} 个工作线程, 队列容量 {}",
            self.workers, self.capacity
        );

        *state = Some(PoolState {
            sender: sender.clone(),
            handles,
        });
        Ok(sender)
    }

    /// 关闭分发池，等待已提交的任务执行完毕
    pub fn shutdown(&self) {
        let Some(state) = self.state.lock().take() else {
            return;
        };
        drop(state.sender);

        if self.is_worker_thread() {
            warn!("在事件分发线程内关闭分发池，不等待工作线程退出");
            return;
        }
        for handle in state.handles {
            if handle.join().is_err() {
                error!("事件分发线程异常退出");
            }
        }
        debug!("事件分发池已关闭");
    }

    /// 是否已启动
    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(job: Job) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        error!("异步观察者发生 panic: {}", panic_message(payload.as_ref()));
    }
}

fn closed() -> DependencyError {
    DependencyError::InvalidState {
        message: "事件分发池已关闭".to_string(),
    }
}

/// 提取 panic 负载中的消息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知 panic".to_string()
    }
}
