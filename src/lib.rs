#![forbid(unsafe_code)]

// botswarm library - staggered swarms of scripted game-world client sessions

pub mod behavior;
pub mod client;
pub mod config;
pub mod metrics;
pub mod session;
pub mod swarm;
