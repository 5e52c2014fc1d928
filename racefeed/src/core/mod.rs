pub mod clock;
pub mod countdown;
pub mod filter;
pub mod handle_feed;
pub mod poller;
pub mod race;
pub mod repository;
pub mod scheduler;
pub mod status;
