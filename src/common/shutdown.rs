use std::future::Future;

use tokio::sync::watch;

/// One-shot termination signal shared between background tasks.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
        }
    }

    /// Signal every waiter. Calling it twice is harmless.
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    /// Resolves once `shutdown` has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            let _ = receiver.wait_for(|terminated| *terminated).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_wakes_waiters() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let shutdown = Shutdown::new();

        let waiter = shutdown.wait();
        shutdown.shutdown();
        runtime.block_on(waiter);

        // waiting after the fact resolves immediately
        runtime.block_on(shutdown.wait());
    }
}
