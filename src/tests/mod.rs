mod aggregator_tests;
mod lifecycle_tests;
mod settings_tests;
mod sync_tests;
