//! Integration tests for the suspending branch cache.

use branch_cache::{CacheBranchAsync, CacheDirection, Error};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn delay(duration: Duration) {
    tokio::time::sleep(duration).await;
}

fn raw<V: Clone + Send + Sync + 'static>(tree: &CacheBranchAsync<V>, key: &str) -> Option<V> {
    tree.get(key).map(|node| node.clone_raw().expect("dirty node"))
}

async fn counter_chain(source: &Arc<AtomicI64>) -> CacheBranchAsync<i64> {
    let tree = CacheBranchAsync::<i64>::new();

    let leaf_source = Arc::clone(source);
    tree.set("count/+1/+1", move |_| {
        let value = leaf_source.load(Ordering::SeqCst);
        async move { Ok(value) }
    })
    .await
    .expect("leaf");

    for (key, child) in [("count/+1", "count/+1/+1"), ("count", "count/+1")] {
        tree.set(key, move |root| async move {
            delay(Duration::from_millis(1)).await;
            root.get(child)
                .ok_or_else(|| Error::Other(format!("{} missing", child)))
                .and_then(|node| node.raw())
                .map(|value| *value + 1)
        })
        .await
        .expect("chain");
    }
    tree
}

#[tokio::test]
async fn test_unit_scenario() {
    let branch = CacheBranchAsync::<u32>::new();
    assert!(branch.get("1").is_none());

    let node = branch.ensure("1", |_| async { Ok(1) }).await.unwrap();
    assert_eq!(*node.raw().unwrap(), 1);
    assert_eq!(*branch.get("1").unwrap().raw().unwrap(), 1);

    let node = branch
        .set("1", |_| async { Ok(2) })
        .await
        .unwrap()
        .get("1")
        .unwrap();
    assert_eq!(*node.raw().unwrap(), 2);

    branch.delete("1").await;
    assert!(branch.get("1").is_none());
}

#[tokio::test]
async fn test_branch_ensure_and_get() {
    let branch = CacheBranchAsync::<String>::new();
    assert!(branch.get("user").is_none());

    let node = branch
        .ensure("user/name", |_| async { Ok("john".to_string()) })
        .await
        .unwrap();
    assert_eq!(*node.raw().unwrap(), "john");
    assert!(branch.get("user").is_none());
    assert_eq!(raw(&branch, "user/name").as_deref(), Some("john"));

    let again = branch
        .ensure("user/name", |_| async { Ok("lee".to_string()) })
        .await
        .unwrap();
    assert_eq!(*again.raw().unwrap(), "john");
}

#[tokio::test]
async fn test_branch_delete_cascades() {
    let branch = CacheBranchAsync::<String>::new();
    branch
        .ensure("user/name", |_| async { Ok("john".to_string()) })
        .await
        .unwrap();
    branch
        .set("user/name", |_| async { Ok("lee".to_string()) })
        .await
        .unwrap();
    branch
        .set("user/name/first", |_| async { Ok("kim".to_string()) })
        .await
        .unwrap();
    assert_eq!(raw(&branch, "user/name").as_deref(), Some("lee"));
    assert_eq!(raw(&branch, "user/name/first").as_deref(), Some("kim"));

    branch.delete("user/name").await;
    assert!(branch.get("user/name").is_none());
    assert!(branch.get("user/name/first").is_none());

    let node = branch
        .ensure("user/name", |_| async { Ok("park".to_string()) })
        .await
        .unwrap();
    assert_eq!(*node.raw().unwrap(), "park");
}

#[tokio::test]
async fn test_branch_lazy_creation() {
    let branch = CacheBranchAsync::<String>::new();
    assert!(branch.get("user/name/middle").is_none());
    assert!(branch.get("user/name").is_none());

    branch
        .ensure("user/name/middle", |_| async { Ok("lee".to_string()) })
        .await
        .unwrap();
    assert!(branch.get("user/name").is_none());
    assert_eq!(branch.stats().branches, 4);
}

#[tokio::test]
async fn test_caching_after_delay() {
    let branch = CacheBranchAsync::<i64>::new();
    let count = Arc::new(AtomicI64::new(0));

    let c = Arc::clone(&count);
    branch
        .ensure("count", move |_| {
            let c = Arc::clone(&c);
            async move { Ok(c.load(Ordering::SeqCst)) }
        })
        .await
        .unwrap();
    let c = Arc::clone(&count);
    branch
        .ensure("count/+1", move |_| {
            let c = Arc::clone(&c);
            async move { Ok(c.load(Ordering::SeqCst) + 1) }
        })
        .await
        .unwrap();

    assert_eq!(raw(&branch, "count"), Some(0));
    assert_eq!(raw(&branch, "count/+1"), Some(1));

    count.fetch_add(1, Ordering::SeqCst);
    delay(Duration::from_millis(20)).await;
    branch
        .cache("count", Some(CacheDirection::TopDown))
        .await
        .unwrap();

    assert_eq!(raw(&branch, "count"), Some(1));
    assert_eq!(raw(&branch, "count/+1"), Some(2));
}

#[tokio::test]
async fn test_cache_bottom_up() {
    let source = Arc::new(AtomicI64::new(0));
    let tree = counter_chain(&source).await;
    assert_eq!(raw(&tree, "count"), Some(2));

    source.store(10, Ordering::SeqCst);
    tree.cache("count", Some(CacheDirection::BottomUp))
        .await
        .unwrap();

    assert_eq!(raw(&tree, "count/+1/+1"), Some(10));
    assert_eq!(raw(&tree, "count/+1"), Some(11));
    assert_eq!(raw(&tree, "count"), Some(12));
}

#[tokio::test]
async fn test_cache_top_down() {
    let source = Arc::new(AtomicI64::new(0));
    let tree = counter_chain(&source).await;

    source.store(10, Ordering::SeqCst);
    tree.cache("count", Some(CacheDirection::TopDown))
        .await
        .unwrap();

    assert_eq!(raw(&tree, "count"), Some(2));
    assert_eq!(raw(&tree, "count/+1"), Some(1));
    assert_eq!(raw(&tree, "count/+1/+1"), Some(10));
}

#[tokio::test]
async fn test_clone_does_not_alias() {
    let branch = CacheBranchAsync::<serde_json::Value>::new();
    assert!(branch.get("data").is_none());

    let first = branch
        .ensure("data", |_| async { Ok(serde_json::json!({ "test": 1 })) })
        .await
        .unwrap();
    let second = branch
        .ensure("data", |_| async { Ok(serde_json::json!({ "test": 1 })) })
        .await
        .unwrap();

    let raw = first.raw().unwrap();
    let copy = second.clone_raw().unwrap();
    assert_eq!(*raw, copy);
    assert!(!std::ptr::eq(&*raw, &copy));
}

#[tokio::test]
async fn test_failed_generator_leaves_node_untouched() {
    let branch = CacheBranchAsync::<u32>::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let err = branch
        .ensure("remote", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::GeneratorError("timeout".to_string())) }
        })
        .await
        .unwrap_err();

    assert_eq!(err, Error::GeneratorError("timeout".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(branch.get("remote").is_none());

    let node = branch.ensure("remote", |_| async { Ok(3) }).await.unwrap();
    assert_eq!(*node.raw().unwrap(), 3);
}

#[tokio::test]
async fn test_cache_failure_propagates() {
    let branch = CacheBranchAsync::<u32>::new();
    let fail = Arc::new(AtomicUsize::new(0));

    let flag = Arc::clone(&fail);
    branch
        .ensure("flaky", move |_| {
            let failing = flag.load(Ordering::SeqCst) > 0;
            async move {
                delay(Duration::from_millis(1)).await;
                if failing {
                    Err(Error::GeneratorError("upstream down".to_string()))
                } else {
                    Ok(1)
                }
            }
        })
        .await
        .unwrap();

    fail.store(1, Ordering::SeqCst);
    let err = branch.cache("flaky", None).await.unwrap_err();
    assert_eq!(err, Error::GeneratorError("upstream down".to_string()));
    assert_eq!(raw(&branch, "flaky"), Some(1));
}

#[tokio::test]
async fn test_cache_bottom_up_stops_at_first_failure() {
    let branch = CacheBranchAsync::<u32>::new();
    let fail = Arc::new(AtomicUsize::new(0));
    let top_calls = Arc::new(AtomicUsize::new(0));
    let leaf_calls = Arc::new(AtomicUsize::new(0));

    let calls = Arc::clone(&top_calls);
    branch
        .ensure("job", move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
            async move { Ok(n) }
        })
        .await
        .unwrap();
    let flag = Arc::clone(&fail);
    branch
        .ensure("job/step", move |_| {
            let failing = flag.load(Ordering::SeqCst) > 0;
            async move {
                if failing {
                    Err(Error::GeneratorError("step failed".to_string()))
                } else {
                    Ok(100)
                }
            }
        })
        .await
        .unwrap();
    let calls = Arc::clone(&leaf_calls);
    branch
        .ensure("job/step/input", move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
            async move { Ok(n) }
        })
        .await
        .unwrap();

    fail.store(1, Ordering::SeqCst);
    let err = branch
        .cache("job", Some(CacheDirection::BottomUp))
        .await
        .unwrap_err();
    assert_eq!(err, Error::GeneratorError("step failed".to_string()));

    // The leaf ran before the failure, the top never ran.
    assert_eq!(raw(&branch, "job/step/input"), Some(1));
    assert_eq!(raw(&branch, "job/step"), Some(100));
    assert_eq!(raw(&branch, "job"), Some(0));
    assert_eq!(leaf_calls.load(Ordering::SeqCst), 2);
    assert_eq!(top_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_ensure_last_store_wins() {
    let branch = CacheBranchAsync::<u32>::new();

    let slow = branch.ensure("race", |_| async {
        delay(Duration::from_millis(30)).await;
        Ok(1)
    });
    let fast = branch.ensure("race", |_| async {
        delay(Duration::from_millis(5)).await;
        Ok(2)
    });
    let (slow, fast) = tokio::join!(slow, fast);

    // Both saw an empty node before suspending; the slower store lands last.
    assert!(slow.unwrap().ptr_eq(&fast.unwrap()));
    assert_eq!(raw(&branch, "race"), Some(1));
}

#[tokio::test]
async fn test_handles_cross_tasks() {
    let branch = CacheBranchAsync::<u64>::new();
    let mut handles = vec![];

    for i in 0..10u64 {
        let tree = branch.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("task/{}", i);
            tree.ensure(&key, move |_| async move { Ok(i * i) })
                .await
                .map(|node| *node.raw().expect("produced"))
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let value = handle.await.expect("task failed").expect("generator");
        assert_eq!(value, (i * i) as u64);
    }
    assert_eq!(branch.stats().dirty_nodes, 10);
}
