//! 事务传播行为
use di_impl::{
    Propagation, TransactionError, TransactionFrame, TransactionInterceptor, TransactionResource,
};
use infrastructure_common::BoxError;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// 以事务帧为单位暂存写入的内存存储
#[derive(Default)]
struct Store {
    pending: Mutex<HashMap<String, Vec<String>>>,
    committed: Mutex<Vec<String>>,
}

impl Store {
    fn write(&self, interceptor: &TransactionInterceptor, value: &str) {
        match interceptor.current_frame() {
            Some(frame) => self
                .pending
                .lock()
                .unwrap()
                .entry(frame.id().to_string())
                .or_default()
                .push(value.to_string()),
            None => self.committed.lock().unwrap().push(value.to_string()),
        }
    }

    fn committed(&self) -> Vec<String> {
        self.committed.lock().unwrap().clone()
    }
}

impl TransactionResource for Store {
    fn begin(&self, frame: &TransactionFrame) -> Result<(), BoxError> {
        self.pending
            .lock()
            .unwrap()
            .insert(frame.id().to_string(), Vec::new());
        Ok(())
    }

    fn commit(&self, frame: &TransactionFrame) -> Result<(), BoxError> {
        let writes = self
            .pending
            .lock()
            .unwrap()
            .remove(&frame.id().to_string())
            .unwrap_or_default();
        self.committed.lock().unwrap().extend(writes);
        Ok(())
    }

    fn rollback(&self, frame: &TransactionFrame) -> Result<(), BoxError> {
        self.pending.lock().unwrap().remove(&frame.id().to_string());
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
struct InsufficientFunds(String);

impl std::fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InsufficientFunds {}

fn setup() -> (Arc<Store>, TransactionInterceptor) {
    let store = Arc::new(Store::default());
    let interceptor = TransactionInterceptor::new(store.clone());
    (store, interceptor)
}

#[test]
fn test_mandatory_outside_transaction_fails() {
    let (store, tx) = setup();

    let result = tx.invoke::<(), InsufficientFunds, _>(Propagation::Mandatory, || {
        store.write(&tx, "never");
        Ok(())
    });

    assert!(matches!(result, Err(TransactionError::TransactionRequired)));
    assert!(store.committed().is_empty());
}

#[test]
fn test_required_commits_on_success() {
    let (store, tx) = setup();

    let value = tx
        .invoke::<u32, InsufficientFunds, _>(Propagation::Required, || {
            store.write(&tx, "a");
            Ok(1)
        })
        .unwrap();

    assert_eq!(value, 1);
    assert_eq!(store.committed(), ["a"]);
    assert!(!tx.is_transaction_active());
}

#[test]
fn test_required_panic_rolls_back_and_resumes() {
    let (store, tx) = setup();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        tx.invoke::<(), InsufficientFunds, _>(Propagation::Required, || {
            store.write(&tx, "lost");
            panic!("connection reset");
        })
    }));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"connection reset"));
    assert!(store.committed().is_empty());
    assert!(!tx.is_transaction_active());
}

#[test]
fn test_required_checked_failure_is_wrapped_and_rolled_back() {
    let (store, tx) = setup();

    let result = tx.invoke::<(), _, _>(Propagation::Required, || {
        store.write(&tx, "lost");
        Err(InsufficientFunds("balance too low".to_string()))
    });

    match result {
        Err(TransactionError::RolledBack { source }) => {
            assert_eq!(source.to_string(), "balance too low");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(store.committed().is_empty());
}

#[test]
fn test_exempt_failure_commits() {
    let (store, tx) = setup();

    let result = tx.invoke_exempting::<(), _, _, _>(
        Propagation::Required,
        |_: &InsufficientFunds| true,
        || {
            store.write(&tx, "kept");
            Err(InsufficientFunds("declined".to_string()))
        },
    );

    assert!(matches!(result, Err(TransactionError::Application(_))));
    assert_eq!(store.committed(), ["kept"]);
}

#[test]
fn test_joined_failure_rolls_back_outer() {
    let (store, tx) = setup();

    let result = tx.invoke::<(), InsufficientFunds, _>(Propagation::Required, || {
        store.write(&tx, "outer");
        let inner = tx.invoke::<(), _, _>(Propagation::Mandatory, || {
            Err(InsufficientFunds("inner".to_string()))
        });
        assert!(inner.is_err());
        assert!(tx.current_frame().unwrap().is_marked_for_rollback());
        Ok(())
    });

    assert!(result.is_ok());
    assert!(store.committed().is_empty());
}

#[test]
fn test_requires_new_commits_independently() {
    let (store, tx) = setup();

    let result = tx.invoke::<(), InsufficientFunds, _>(Propagation::Required, || {
        let outer = tx.current_frame().unwrap().id();
        store.write(&tx, "outer");
        tx.invoke::<(), InsufficientFunds, _>(Propagation::RequiresNew, || {
            assert_ne!(tx.current_frame().unwrap().id(), outer);
            store.write(&tx, "inner");
            Ok(())
        })
        .unwrap();
        assert_eq!(tx.current_frame().unwrap().id(), outer);
        Err(InsufficientFunds("outer failed".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(store.committed(), ["inner"]);
}

#[test]
fn test_not_supported_suspends() {
    let (store, tx) = setup();

    tx.invoke::<(), InsufficientFunds, _>(Propagation::Required, || {
        tx.invoke::<(), InsufficientFunds, _>(Propagation::NotSupported, || {
            assert!(!tx.is_transaction_active());
            store.write(&tx, "direct");
            Ok(())
        })
        .unwrap();
        assert!(tx.is_transaction_active());
        tx.set_rollback_only().unwrap();
        Ok(())
    })
    .unwrap();

    assert_eq!(store.committed(), ["direct"]);
}

#[test]
fn test_never_inside_transaction_fails() {
    let (_store, tx) = setup();

    tx.invoke::<(), InsufficientFunds, _>(Propagation::Required, || {
        let result = tx.invoke::<(), InsufficientFunds, _>(Propagation::Never, || Ok(()));
        assert!(matches!(result, Err(TransactionError::IllegalState { .. })));
        Ok(())
    })
    .unwrap();

    assert!(tx
        .invoke::<(), InsufficientFunds, _>(Propagation::Never, || Ok(()))
        .is_ok());
}

#[test]
fn test_supports_runs_without_transaction() {
    let (store, tx) = setup();

    let result = tx.invoke::<(), _, _>(Propagation::Supports, || {
        assert!(!tx.is_transaction_active());
        store.write(&tx, "plain");
        Err(InsufficientFunds("plain failure".to_string()))
    });

    assert_eq!(
        result.unwrap_err().into_inner(),
        Some(InsufficientFunds("plain failure".to_string()))
    );
    assert_eq!(store.committed(), ["plain"]);
    assert!(tx.set_rollback_only().is_err());
}

#[test]
fn test_frames_are_thread_confined() {
    let (_store, tx) = setup();

    tx.invoke::<(), InsufficientFunds, _>(Propagation::Required, || {
        let other = tx.clone();
        let active_elsewhere = std::thread::spawn(move || other.is_transaction_active())
            .join()
            .unwrap();
        assert!(!active_elsewhere);
        Ok(())
    })
    .unwrap();
}
