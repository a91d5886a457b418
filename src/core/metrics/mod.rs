//! Chart and table aggregators over parsed dump sections.

pub mod distribution;
pub mod intensity;
pub mod occupancy;
pub mod qscore;
pub mod summary;
pub mod surface;
