//! 事件分发：同步/异步线程与限定符匹配
use crossbeam_channel::unbounded;
use di_abstractions::BeanClass;
use di_impl::{Environment, EnvironmentConfig};
use infrastructure_common::{BoxError, DependencyError, Qualifier, ScopeKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

#[derive(Debug)]
struct OrderPlaced {
    id: u32,
}

fn urgent() -> Qualifier {
    Qualifier::new("Urgent")
}

#[test]
fn test_sync_observer_runs_on_firing_thread_and_async_elsewhere() {
    let env = Environment::new();
    let sync_thread: Arc<Mutex<Option<ThreadId>>> = Arc::default();
    let (tx, rx) = unbounded::<ThreadId>();

    let recorded = Arc::clone(&sync_thread);
    env.observe([], move |event: &OrderPlaced| -> Result<(), BoxError> {
        assert_eq!(event.id, 7);
        *recorded.lock().unwrap() = Some(thread::current().id());
        Ok(())
    });
    env.observe_async([], move |_: &OrderPlaced| -> Result<(), BoxError> {
        tx.send(thread::current().id())?;
        Ok(())
    });

    let firing = thread::current().id();
    env.fire(OrderPlaced { id: 7 }).unwrap();

    assert_eq!(*sync_thread.lock().unwrap(), Some(firing));
    let async_thread = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_ne!(async_thread, firing);
}

#[test]
fn test_qualified_and_unqualified_channels_are_separate() {
    let env = Environment::new();
    let unqualified = Arc::new(AtomicUsize::new(0));
    let qualified = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&unqualified);
    env.observe([], move |_: &OrderPlaced| -> Result<(), BoxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let counter = Arc::clone(&qualified);
    env.observe([urgent()], move |_: &OrderPlaced| -> Result<(), BoxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    env.fire(OrderPlaced { id: 1 }).unwrap();
    assert_eq!(unqualified.load(Ordering::SeqCst), 1);
    assert_eq!(qualified.load(Ordering::SeqCst), 0);

    env.fire_qualified(OrderPlaced { id: 2 }, [urgent()]).unwrap();
    assert_eq!(unqualified.load(Ordering::SeqCst), 1);
    assert_eq!(qualified.load(Ordering::SeqCst), 1);

    env.fire_qualified(OrderPlaced { id: 3 }, [Qualifier::new("Other")])
        .unwrap();
    assert_eq!(unqualified.load(Ordering::SeqCst), 1);
    assert_eq!(qualified.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sync_observers_run_in_registration_order() {
    let env = Environment::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for label in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        env.observe([], move |_: &OrderPlaced| -> Result<(), BoxError> {
            order.lock().unwrap().push(label);
            Ok(())
        });
    }

    env.fire(OrderPlaced { id: 1 }).unwrap();
    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
    assert_eq!(env.observers_for::<OrderPlaced>([]).len(), 3);
}

#[test]
fn test_sync_observer_failure_is_reported() {
    let env = Environment::new();
    let after = Arc::new(AtomicUsize::new(0));

    env.observe([], |_: &OrderPlaced| -> Result<(), BoxError> {
        Err("库存不足".into())
    });
    let counter = Arc::clone(&after);
    env.observe([], move |_: &OrderPlaced| -> Result<(), BoxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let result = env.fire(OrderPlaced { id: 1 });
    match result {
        Err(DependencyError::ObserverFailed { source, .. }) => {
            assert_eq!(source.to_string(), "库存不足");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(after.load(Ordering::SeqCst), 0);
}

#[test]
fn test_async_observer_failure_does_not_reach_firer() {
    let env = Environment::new();
    let (tx, rx) = unbounded::<()>();

    env.observe_async([], |_: &OrderPlaced| -> Result<(), BoxError> {
        Err("异步失败".into())
    });
    env.observe_async([], move |_: &OrderPlaced| -> Result<(), BoxError> {
        tx.send(())?;
        Ok(())
    });

    env.fire(OrderPlaced { id: 1 }).unwrap();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
}

#[derive(Debug, Default)]
struct Ledger {
    entries: Mutex<Vec<u32>>,
}

#[test]
fn test_bean_observer_method_receives_instance() {
    let env = Environment::new();
    env.add([BeanClass::of::<Ledger>()
        .scope(ScopeKind::Singleton)
        .default_constructor()
        .observes([], |ledger: &Ledger, event: &OrderPlaced| -> Result<(), BoxError> {
            ledger.entries.lock().unwrap().push(event.id);
            Ok(())
        })
        .build()]);

    env.fire(OrderPlaced { id: 4 }).unwrap();
    env.fire(OrderPlaced { id: 5 }).unwrap();

    let ledger = env.get::<Ledger>().unwrap();
    assert_eq!(*ledger.entries.lock().unwrap(), [4, 5]);

    assert!(env.remove_class::<Ledger>());
    assert!(env.observers_for::<OrderPlaced>([]).is_empty());
}

#[test]
fn test_saturated_queue_still_delivers_every_event() {
    let env = Environment::with_config(
        EnvironmentConfig::default()
            .with_async_workers(1)
            .with_async_queue_capacity(1),
    );
    let delivered = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = unbounded::<()>();

    let counter = Arc::clone(&delivered);
    env.observe_async([], move |_: &OrderPlaced| -> Result<(), BoxError> {
        thread::sleep(Duration::from_millis(2));
        counter.fetch_add(1, Ordering::SeqCst);
        tx.send(())?;
        Ok(())
    });

    for id in 0..20 {
        env.fire(OrderPlaced { id }).unwrap();
    }
    for _ in 0..20 {
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    assert_eq!(delivered.load(Ordering::SeqCst), 20);
}
