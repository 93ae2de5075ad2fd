use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

use super::*;

fn counting_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
	let counter = Arc::clone(counter);
	async move {
		counter.fetch_add(1, Ordering::SeqCst);
	}
}

#[tokio::test(start_paused = true)]
async fn test_replace_not_queue() {
	let scheduler = TaskScheduler::new();
	let runs = Arc::new(AtomicUsize::new(0));

	for _ in 0..5 {
		scheduler.schedule("reconcile", Duration::from_millis(50), counting_task(&runs));
	}
	assert!(scheduler.is_pending("reconcile"));
	assert_eq!(scheduler.replaced_total(), 4);

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(runs.load(Ordering::SeqCst), 1);
	assert!(!scheduler.is_pending("reconcile"));
	assert_eq!(scheduler.executed_total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_burst_within_min_interval_runs_once_after_interval() {
	let scheduler = TaskScheduler::new();
	scheduler.set_min_interval("scan", Duration::from_millis(200));
	let stamps = Arc::new(Mutex::new(Vec::new()));

	let record = |stamps: &Arc<Mutex<Vec<Instant>>>| {
		let stamps = Arc::clone(stamps);
		async move { stamps.lock().push(Instant::now()) }
	};

	scheduler.schedule("scan", Duration::ZERO, record(&stamps));
	tokio::time::sleep(Duration::from_millis(5)).await;
	let first_done = scheduler.last_run_at("scan").expect("first run completed");

	for _ in 0..20 {
		scheduler.schedule("scan", Duration::ZERO, record(&stamps));
		tokio::time::sleep(Duration::from_millis(2)).await;
	}

	tokio::time::sleep(Duration::from_millis(500)).await;
	let stamps = stamps.lock();
	assert_eq!(stamps.len(), 2);
	assert!(stamps[1] >= first_done + Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_requested_delay_wins_when_longer_than_interval() {
	let scheduler = TaskScheduler::new();
	scheduler.set_min_interval("retry", Duration::from_millis(10));
	let runs = Arc::new(AtomicUsize::new(0));

	scheduler.schedule("retry", Duration::ZERO, counting_task(&runs));
	tokio::time::sleep(Duration::from_millis(1)).await;

	let start = Instant::now();
	let due = scheduler.schedule("retry", Duration::from_millis(300), counting_task(&runs));
	assert!(due >= start + Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_distinct_names_are_independent() {
	let scheduler = TaskScheduler::new();
	let a = Arc::new(AtomicUsize::new(0));
	let b = Arc::new(AtomicUsize::new(0));

	scheduler.schedule("a", Duration::from_millis(10), counting_task(&a));
	scheduler.schedule("b", Duration::from_millis(10), counting_task(&b));
	scheduler.schedule("a", Duration::from_millis(10), counting_task(&a));

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(a.load(Ordering::SeqCst), 1);
	assert_eq!(b.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_cancels_pending_timers() {
	let scheduler = TaskScheduler::new();
	let runs = Arc::new(AtomicUsize::new(0));

	scheduler.schedule("a", Duration::from_millis(10), counting_task(&runs));
	scheduler.schedule("b", Duration::from_millis(10), counting_task(&runs));
	assert_eq!(scheduler.clear(), 2);
	assert_eq!(scheduler.pending_count(), 0);

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(runs.load(Ordering::SeqCst), 0);

	// Slots scheduled after a clear use the fresh root token.
	scheduler.schedule("a", Duration::from_millis(10), counting_task(&runs));
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_single_slot() {
	let scheduler = TaskScheduler::new();
	let runs = Arc::new(AtomicUsize::new(0));

	scheduler.schedule("a", Duration::from_millis(10), counting_task(&runs));
	assert!(scheduler.cancel("a"));
	assert!(!scheduler.cancel("a"));

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_running_task_survives_replacement() {
	let scheduler = TaskScheduler::new();
	let finished = Arc::new(AtomicUsize::new(0));

	let done = Arc::clone(&finished);
	scheduler.schedule("slow", Duration::ZERO, async move {
		tokio::time::sleep(Duration::from_millis(100)).await;
		done.fetch_add(1, Ordering::SeqCst);
	});
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert!(scheduler.is_running("slow"));

	scheduler.schedule("slow", Duration::ZERO, counting_task(&finished));
	tokio::time::sleep(Duration::from_millis(300)).await;

	assert_eq!(finished.load(Ordering::SeqCst), 2);
	assert!(!scheduler.is_running("slow"));
}

#[tokio::test(start_paused = true)]
async fn test_marked_completion_spaces_next_run() {
	let scheduler = TaskScheduler::new();
	scheduler.set_min_interval("reconcile", Duration::from_millis(250));
	let runs = Arc::new(AtomicUsize::new(0));

	scheduler.schedule("reconcile", Duration::ZERO, counting_task(&runs));
	tokio::time::sleep(Duration::from_millis(10)).await;
	assert_eq!(runs.load(Ordering::SeqCst), 1);

	// The handed-off work finishes much later than the task itself.
	tokio::time::sleep(Duration::from_millis(400)).await;
	scheduler.mark_completed("reconcile");
	let due = scheduler.schedule("reconcile", Duration::ZERO, counting_task(&runs));
	assert_eq!(due - Instant::now(), Duration::from_millis(250));

	scheduler.forget_completion("reconcile");
	let due = scheduler.schedule("reconcile", Duration::ZERO, counting_task(&runs));
	assert_eq!(due, Instant::now());
}
