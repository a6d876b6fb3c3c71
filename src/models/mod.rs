pub mod aggregate;
pub mod lifecycle;
pub mod poll;
pub mod response;
pub mod stats;
