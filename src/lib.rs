pub mod config;
pub mod tarot;
pub mod rate_limit;
pub mod gpt;
pub mod neynar;
pub mod reading;
pub mod webhook;
