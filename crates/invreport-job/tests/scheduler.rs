//! Cron firing through the real scheduler. Uses an every-second cadence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use invreport_job::ReportScheduler;

const EVERY_SECOND: &str = "* * * * * *";

async fn wait_for(counter: &AtomicUsize, at_least: usize, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if counter.load(Ordering::SeqCst) >= at_least {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn task_fires_repeatedly_until_cancelled() {
    let mut scheduler = ReportScheduler::new().await.unwrap();
    let fires = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&fires);
    let handle = scheduler
        .schedule(EVERY_SECOND, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();
    scheduler.start().await.unwrap();

    assert!(wait_for(&fires, 2, Duration::from_secs(5)).await);

    scheduler.cancel(handle).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let after_cancel = fires.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(fires.load(Ordering::SeqCst), after_cancel);

    scheduler.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_task_keeps_its_registration() {
    let mut scheduler = ReportScheduler::new().await.unwrap();
    let fires = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&fires);
    scheduler
        .schedule(EVERY_SECOND, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("report body blew up");
            }
        })
        .await
        .unwrap();
    scheduler.start().await.unwrap();

    assert!(wait_for(&fires, 2, Duration::from_secs(5)).await);

    scheduler.stop().await.unwrap();
}
