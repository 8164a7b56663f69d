use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::*;

#[derive(Default)]
struct CountingScheduler {
    active: AtomicBool,
    waited_ms: AtomicU64,
}

#[async_trait]
impl ExternalScheduler for CountingScheduler {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn wait(&self, ms: u64) {
        self.waited_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn timer_waits_for_the_requested_duration() {
    let waiter = Waiter::default();
    let started = tokio::time::Instant::now();
    waiter.wait(370).await;
    assert!(started.elapsed() >= Duration::from_millis(370));
}

#[tokio::test(start_paused = true)]
async fn active_scheduler_takes_over() {
    let scheduler = Arc::new(CountingScheduler::default());
    scheduler.active.store(true, Ordering::SeqCst);
    let waiter = Waiter::new(Some(scheduler.clone() as Arc<dyn ExternalScheduler>));

    let started = tokio::time::Instant::now();
    waiter.wait(500).await;

    assert_eq!(scheduler.waited_ms.load(Ordering::SeqCst), 500);
    assert!(started.elapsed() < Duration::from_millis(1));
}

#[tokio::test(start_paused = true)]
async fn inactive_scheduler_falls_back_to_timer() {
    let scheduler = Arc::new(CountingScheduler::default());
    let waiter = Waiter::new(Some(scheduler.clone() as Arc<dyn ExternalScheduler>));

    waiter.wait(200).await;
    assert_eq!(scheduler.waited_ms.load(Ordering::SeqCst), 0);

    scheduler.active.store(true, Ordering::SeqCst);
    waiter.wait(200).await;
    assert_eq!(scheduler.waited_ms.load(Ordering::SeqCst), 200);
}
