use std::sync::Arc;

use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::StateStore;
use crate::Error;
use crate::NotificationDispatcher;
use crate::Result;

/// Process signals the watchdog reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// SIGTERM: drain state to the snapshot, then exit
    Terminate,
    /// SIGINT: exit at once, state is lost
    Interrupt,
    /// SIGUSR1: send one test notification
    TestNotification,
}

pub struct ShutdownCoordinator {
    store: Arc<StateStore>,
    dispatcher: Arc<NotificationDispatcher>,
    graceful_tx: watch::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new(
        store: Arc<StateStore>,
        dispatcher: Arc<NotificationDispatcher>,
        graceful_tx: watch::Sender<()>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            graceful_tx,
        }
    }

    /// Reacts to one signal. Returns the exit code when the process should
    /// terminate.
    pub fn handle(
        &self,
        received: ProcessSignal,
    ) -> Option<i32> {
        match received {
            ProcessSignal::Terminate => {
                info!("SIGTERM detected, writing state snapshot.");
                let code = match self.store.dump_and_halt() {
                    Ok(()) => 0,
                    Err(e) => {
                        error!("state snapshot failed, exiting anyway: {:?}", e);
                        1
                    }
                };
                self.stop_servers();
                Some(code)
            }
            ProcessSignal::Interrupt => {
                warn!("SIGINT detected, exiting without snapshot.");
                self.stop_servers();
                Some(0)
            }
            ProcessSignal::TestNotification => {
                info!("SIGUSR1 detected, sending test notification.");
                self.dispatcher.send_test_notification();
                None
            }
        }
    }

    /// Waits for signals until one of them ends the process, and returns
    /// its exit code.
    pub async fn listen(self) -> Result<i32> {
        let mut sigterm = signal(SignalKind::terminate()).map_err(Error::Signal)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(Error::Signal)?;
        let mut sigusr1 = signal(SignalKind::user_defined1()).map_err(Error::Signal)?;

        loop {
            let received = tokio::select! {
                _ = sigterm.recv() => ProcessSignal::Terminate,
                _ = sigint.recv() => ProcessSignal::Interrupt,
                _ = sigusr1.recv() => ProcessSignal::TestNotification,
            };
            if let Some(code) = self.handle(received) {
                return Ok(code);
            }
        }
    }

    fn stop_servers(&self) {
        if let Err(e) = self.graceful_tx.send(()) {
            // No receiver left: nothing to stop.
            info!("no server to stop: {}", e);
        }
    }
}
