pub mod dump;
pub mod engine;
pub mod error;
pub mod external;
pub mod io;
pub mod metrics;
pub mod model;
pub mod runinfo;

#[cfg(test)]
pub(crate) mod fixtures;
