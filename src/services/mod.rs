pub mod aggregator;
pub mod geolocation;
pub mod identity;
pub mod lifecycle;
pub mod stats;
pub mod sync;
pub mod voting;
