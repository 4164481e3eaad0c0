#![deny(clippy::all)]
#![warn(unused_crate_dependencies)]

// used by the binary only
use env_logger as _;

pub mod common;
pub mod config;
pub mod db;
pub mod metrics;
pub mod net;
pub mod protocol;
pub mod recommend;
pub mod router;
pub mod secure;
