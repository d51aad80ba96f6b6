//! A synchronization utility for sending / receiving shutdown signals.
//!
//! - Multi-producer and multi-consumer: clone to get another handle.
//! - Consumers can receive shutdown signals sent prior to 'subscribing'
//!   (unlike [`tokio::sync::broadcast`]).
//! - Safe to send a shutdown signal multiple times.
//!
//! The implementation (ab)uses the fact that [`Semaphore::acquire`] with 0
//! permits only returns once the semaphore has been closed; closing it is
//! this channel's "send".

use std::sync::Arc;

use tokio::sync::Semaphore;

#[derive(Clone, Debug)]
pub struct ShutdownChannel {
    inner: Arc<Semaphore>,
}

impl Default for ShutdownChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Semaphore::new(0)),
        }
    }

    /// Send a shutdown signal, releasing every waiter of [`recv`].
    ///
    /// [`recv`]: Self::recv
    pub fn send(&self) {
        self.inner.close()
    }

    /// Wait for a shutdown signal. Returns immediately if one was already sent.
    pub async fn recv(&self) {
        self.inner
            .acquire()
            .await
            .map_err(|_| ())
            .expect_err("semaphore should only close, never hand out permits")
    }

    pub fn try_recv(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time;

    use super::*;

    #[test]
    fn multiple_sends_is_fine() {
        let shutdown = ShutdownChannel::new();
        shutdown.send();
        shutdown.send();
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_after_close_is_immediate() {
        let shutdown1 = ShutdownChannel::new();
        let shutdown2 = shutdown1.clone();
        time::sleep(Duration::from_secs(1)).await;
        shutdown1.send();
        time::timeout(Duration::from_nanos(1), shutdown2.recv())
            .await
            .expect("did not finish immediately");

        let shutdown3 = shutdown2.clone();
        assert!(shutdown3.try_recv());
    }
}
