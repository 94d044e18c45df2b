//! Deployer runtime: the reconciliation step and the loop that drives it.

mod deployer;
mod reconcile;

pub use deployer::{Deployer, DeployerHandle};
pub use reconcile::{Action, Reconciler};
