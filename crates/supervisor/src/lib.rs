//! autodeploy process supervisor adapter.
//!
//! Implements [`pipeline::ProcessSupervisor`] for [pm2](https://pm2.keymetrics.io/)
//! by shelling out to its CLI. pm2 records each process's git origin URL and
//! deployed revision in `pm2_env.versioning`, which is what the matcher relies
//! on.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** pm2 invocation and output decoding live here. The
//! [`pipeline`] crate sees only [`pipeline::ProcessSupervisor`].

pub mod jlist;
pub mod pm2;

pub use pm2::Pm2Supervisor;
