/// CSV cycle log.
pub mod export;
