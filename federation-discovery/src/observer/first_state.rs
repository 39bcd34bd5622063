use std::future::Future;

use tokio::sync::watch;

/// A signal that is raised at most once and can be awaited by any number of waiters, before or after it is raised.
#[derive(Debug)]
pub(crate) struct FirstStateSignal {
    sender: watch::Sender<bool>,
}

impl FirstStateSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Raises the signal. Returns `true` only for the call that actually raised it.
    pub fn raise(&self) -> bool {
        !self.sender.send_replace(true)
    }

    pub fn is_raised(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the signal is raised. Never resolves if the signal is dropped unraised.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            let raised = receiver.wait_for(|raised| *raised).await.is_ok();
            if !raised {
                std::future::pending::<()>().await;
            }
        }
    }
}
