pub mod poller;
pub mod refresh;
