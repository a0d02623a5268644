pub mod cleanup_scheduler;
pub mod logging_notifier;
