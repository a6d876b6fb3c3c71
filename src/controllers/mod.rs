pub mod admin_controller;
pub mod poll_controller;
pub mod stats_controller;
