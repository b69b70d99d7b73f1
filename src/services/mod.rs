//! Business logic over the storage layer: batch reconciliation, snapshot
//! correction, and the account approval workflow. Presentation code goes
//! through [`crate::directory::Directory`], which wires these services to
//! change notification.

pub mod accounts;
pub mod reconcile;
pub mod snapshot;
