//! The deployer: a supervised reconciliation loop.
//!
//! A deployer adopts the units its manager already runs, then reconciles
//! every unit name delivered by its change feed, strictly one at a time.
//! It runs on its own task until stopped or until any reconciliation step
//! fails; the terminal outcome is shared by every [`DeployerHandle`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::reconcile::Reconciler;
use crate::error::{DeployerError, FeedError};
use crate::port::{ChangeFeed, CredentialSource, Manager, UnitState};

type Outcome = Option<Result<(), DeployerError>>;

/// Deploys and recalls unit agents according to changes in a set of units,
/// and removes its units from state once they are no longer needed.
pub struct Deployer {
    reconciler: Reconciler,
}

impl Deployer {
    pub fn new(
        deployer_name: impl Into<String>,
        state: Arc<dyn UnitState>,
        manager: Arc<dyn Manager>,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(deployer_name, state, manager),
        }
    }

    /// Replace the credential source used for new deployments.
    #[must_use]
    pub fn with_credentials(self, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            reconciler: self.reconciler.with_credentials(credentials),
        }
    }

    /// Spawn the reconciliation loop, consuming `feed`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self, feed: Box<dyn ChangeFeed>) -> DeployerHandle {
        let name: Arc<str> = Arc::from(self.reconciler.deployer_name());
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel::<Outcome>(None);

        let span = info_span!("deployer", deployer = %name);
        let task = tokio::spawn(self.run(feed, stop_rx).instrument(span));

        let supervisor_name = Arc::clone(&name);
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(result) => result,
                Err(e) => Err(DeployerError::Aborted(e.to_string())),
            };
            match &outcome {
                Ok(()) => info!(deployer = %supervisor_name, "Deployer stopped"),
                Err(e) if e.is_fatal() => {
                    error!(deployer = %supervisor_name, fatal = true, error = %e, "Deployer failed");
                }
                Err(e) => {
                    error!(deployer = %supervisor_name, fatal = false, error = %e, "Deployer failed");
                }
            }
            done_tx.send_replace(Some(outcome));
        });

        DeployerHandle {
            name,
            stop_tx: Arc::new(stop_tx),
            done_rx,
        }
    }

    async fn run(
        mut self,
        mut feed: Box<dyn ChangeFeed>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), DeployerError> {
        info!("Deployer starting");
        let result = self.run_loop(feed.as_mut(), &mut stop).await;

        let stopped = feed.stop().await;
        match (result, stopped) {
            (Err(e), Err(stop_err)) => {
                warn!(error = %stop_err, "Failed to stop change feed");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(stop_err)) => Err(stop_err.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn run_loop(
        &mut self,
        feed: &mut dyn ChangeFeed,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<(), DeployerError> {
        self.reconciler.seed().await?;

        loop {
            // A stop request is only honoured between batches; a step in
            // flight always runs to completion.
            tokio::select! {
                biased;
                _ = stop_requested(stop) => {
                    debug!("Stop requested");
                    return Ok(());
                }
                batch = feed.next_batch() => {
                    let Some(batch) = batch else {
                        return Err(feed.err().unwrap_or(FeedError::Closed).into());
                    };
                    for name in &batch {
                        self.reconciler.reconcile(name).await?;
                    }
                }
            }
        }
    }
}

/// Resolves once a stop is requested or every stop sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Handle to a running [`Deployer`].
///
/// Handles are cheap to clone; stopping through any of them stops the
/// deployer for all. Dropping every handle also stops it.
#[derive(Clone)]
pub struct DeployerHandle {
    name: Arc<str>,
    stop_tx: Arc<watch::Sender<bool>>,
    done_rx: watch::Receiver<Outcome>,
}

impl DeployerHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the deployer to stop without waiting for it.
    pub fn kill(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop the deployer and wait for it to exit.
    ///
    /// Safe to call repeatedly; every call returns the terminal outcome.
    pub async fn stop(&self) -> Result<(), DeployerError> {
        self.kill();
        self.wait().await
    }

    /// Wait for the deployer to exit and return its terminal outcome.
    pub async fn wait(&self) -> Result<(), DeployerError> {
        let mut done = self.done_rx.clone();
        let outcome = done
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone());
        match outcome {
            Ok(outcome) => outcome.unwrap_or(Ok(())),
            Err(_) => Err(DeployerError::Aborted(
                "deployer supervisor went away".to_string(),
            )),
        }
    }

    /// Whether the deployer has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done_rx.borrow().is_some()
    }
}

impl fmt::Display for DeployerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deployer for {}", self.name)
    }
}

impl fmt::Debug for DeployerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployerHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}
