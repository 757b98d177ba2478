use std::future::Future;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Tasks sharing one cancellation token. The first failure (error or
/// panic) cancels the token; [`TaskGroup::wait`] returns that failure after
/// every task has finished.
pub struct TaskGroup<E> {
    tasks: JoinSet<Result<(), E>>,
    token: CancellationToken,
}

impl<E> TaskGroup<E>
where
    E: From<JoinError> + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub async fn wait(mut self) -> Result<(), E> {
        let mut first = None;
        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.map_err(E::from).and_then(|r| r);
            if let Err(e) = result {
                self.token.cancel();
                first.get_or_insert(e);
            }
        }
        // siblings are gone; release anything still parked on the token
        self.token.cancel();
        first.map_or(Ok(()), Err)
    }
}
