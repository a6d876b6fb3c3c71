pub mod kv_store;
pub mod lifecycle_repository;
pub mod response_repository;
pub mod session_repository;
