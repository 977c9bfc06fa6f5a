//! Ctrl-C handling shared by every step of a benchmark session.

use actor_bench_core::Error;
use anyhow::Result;
use std::future::Future;
use tokio::sync::watch;

/// Latched interrupt flag.
///
/// The signal handler is installed once, every clone observes the same
/// latch, so a Ctrl-C is honored no matter which actor or step is running.
#[derive(Debug, Clone)]
pub(crate) struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    /// Latch on the first Ctrl-C for the rest of the process.
    pub(crate) fn on_ctrl_c() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });
        Self { rx }
    }

    /// Resolves once interrupted, never when the signal cannot be observed.
    pub(crate) async fn wait(mut self) {
        if self.rx.wait_for(|interrupted| *interrupted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `step` unless an interrupt arrives first.
    pub(crate) async fn guard<T>(&self, step: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            () = self.clone().wait() => Err(Error::Interrupted.into()),
            outcome = step => outcome,
        }
    }
}

impl From<watch::Receiver<bool>> for Interrupt {
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_interrupted(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<Error>(), Some(Error::Interrupted))
    }

    #[tokio::test]
    async fn test_step_runs_without_interrupt() {
        let (_tx, rx) = watch::channel(false);
        let interrupt = Interrupt::from(rx);

        let value = interrupt.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_latch_reaches_every_clone() {
        let (tx, rx) = watch::channel(false);
        let interrupt = Interrupt::from(rx);
        let first_actor = interrupt.clone();
        let later_actor = interrupt.clone();

        tx.send(true).unwrap();
        drop(tx);

        first_actor.wait().await;
        let err = later_actor
            .guard(std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(is_interrupted(&err));

        let err = interrupt.guard(async { Ok(()) }).await.unwrap_err();
        assert!(is_interrupted(&err));
    }

    #[tokio::test]
    async fn test_lost_signal_never_interrupts() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let interrupt = Interrupt::from(rx);

        let value = interrupt.guard(async { Ok("done") }).await.unwrap();
        assert_eq!(value, "done");
    }
}
