use std::thread;

use mc_core::errors::{ErrorInfo, McError};
use mc_core::ThreadComm;

/// Aborts the group when its worker leaves, whether by return, error or panic.
///
/// A worker that returned has finished every collective it joined, so aborting afterwards
/// only affects peers waiting on a collective it will never reach.
struct LeaveOnDrop(ThreadComm);

impl Drop for LeaveOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs `body` once per worker, each on its own thread with a connected [`ThreadComm`].
///
/// Every worker must run concurrently because `collect_results` rendezvouses all of them, so
/// this uses scoped OS threads rather than a bounded pool. Results are ordered by rank. A
/// worker that panics is reported as `worker-panicked`, ahead of the `worker-aborted` errors
/// its peers see; otherwise the first error by rank is returned.
pub fn run_on_threads<T, F>(workers: usize, body: F) -> Result<Vec<T>, McError>
where
    T: Send,
    F: Fn(ThreadComm) -> Result<T, McError> + Sync,
{
    let body = &body;
    let joined: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ThreadComm::group(workers)
            .into_iter()
            .map(|comm| {
                let leave = LeaveOnDrop(comm.clone());
                scope.spawn(move || {
                    let _leave = leave;
                    body(comm)
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join()).collect()
    });

    if let Some(rank) = joined.iter().position(Result::is_err) {
        return Err(McError::Reduction(
            ErrorInfo::new("worker-panicked", "a worker thread panicked")
                .with_context("rank", rank.to_string()),
        ));
    }
    joined.into_iter().flatten().collect()
}
