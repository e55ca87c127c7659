use std::sync::mpsc;

/// Result slot of a job running on a worker thread.
///
/// Dropping the handle abandons the result: the worker finishes its job and
/// its send fails silently.
#[derive(Debug)]
pub struct PendingAction<T> {
    rx: mpsc::Receiver<T>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WorkerPoll<T> {
    Pending,
    Ready(T),
    /// The worker panicked before producing a result.
    Lost,
}

impl<T> PendingAction<T> {
    pub fn try_take(&self) -> WorkerPoll<T> {
        match self.rx.try_recv() {
            Ok(result) => WorkerPoll::Ready(result),
            Err(mpsc::TryRecvError::Empty) => WorkerPoll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => WorkerPoll::Lost,
        }
    }

    /// Blocks until the worker is done.
    pub fn wait(&self) -> WorkerPoll<T> {
        match self.rx.recv() {
            Ok(result) => WorkerPoll::Ready(result),
            Err(mpsc::RecvError) => WorkerPoll::Lost,
        }
    }
}

pub fn spawn_worker_action<T, W>(work: W) -> PendingAction<T>
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
{
    spawn_worker_action_with_abandon(work, |_| {})
}

/// Like [`spawn_worker_action`], but hands the result to `on_abandoned` when
/// the requester dropped its handle before the job finished.
pub fn spawn_worker_action_with_abandon<T, W, A>(work: W, on_abandoned: A) -> PendingAction<T>
where
    T: Send + 'static,
    W: FnOnce() -> T + Send + 'static,
    A: FnOnce(T) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    std::thread::spawn(move || {
        let result = work();
        if let Err(mpsc::SendError(result)) = tx.send(result) {
            tracing::debug!("worker result dropped; requester is gone");
            on_abandoned(result);
        }
    });
    PendingAction { rx }
}
