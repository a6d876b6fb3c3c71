pub mod cors;
pub mod logger;
pub mod session;
pub mod settings;
pub mod startup;
