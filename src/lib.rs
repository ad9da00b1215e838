//! trip-planner core
//!
//! Plans a business trip around a fixed meeting: picks an inter-city
//! transit offer, then fits optional waypoint visits between hub arrival and
//! the meeting deadline.

pub mod model;
pub mod error;
pub mod backoff;
pub mod config;
pub mod cancel;
pub mod traits;
pub mod routing;
pub mod filter;
pub mod scoring;
pub mod sequencer;
pub mod repair;
pub mod transport;
pub mod directory;
pub mod pipeline;
pub mod osrm;
pub mod amap;
pub mod haversine;
pub mod stub;
pub mod chat;
