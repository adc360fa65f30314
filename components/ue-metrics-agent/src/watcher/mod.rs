pub mod poller;
pub mod watcher;
