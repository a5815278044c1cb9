use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("meshview-worker-global")
			.build()
			.expect("failed to build meshview-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task labelled `task` for tracing.
///
/// Uses the ambient tokio runtime when called from inside one, and a
/// shared two-thread runtime otherwise, so synchronous callers (UI glue,
/// plain `#[test]`s) can open streams without owning a runtime.
pub fn spawn<F>(task: &'static str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(task, "worker.spawn");
	runtime_handle().spawn(fut)
}
