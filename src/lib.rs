pub mod config;
pub mod demo_feed;
pub mod derive;
pub mod error;
pub mod http_client;
pub mod nba_fetch;
pub mod query_cache;
pub mod request_key;
pub mod session;
pub mod source;
pub mod state;
pub mod team_codes;
