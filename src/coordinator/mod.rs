//! Coordinator Facade
//!
//! [`cluster::AppStateCluster`] is the entry point used by application code:
//! one instance per node, explicitly started and closed.

pub mod cluster;
pub mod registry;
