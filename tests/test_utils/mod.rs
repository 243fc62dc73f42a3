#![allow(dead_code)]

mod setup;
mod workload;

pub use setup::*;
pub use workload::*;
