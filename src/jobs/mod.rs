// Background jobs

pub mod status_feed;
