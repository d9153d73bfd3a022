//! Core archiving pipeline: configuration, probing, download orchestration
//! and the persistent history store.

pub mod config;
pub mod engine;
pub mod fetcher;
pub mod history;
pub mod models;
pub mod url_list;

#[cfg(test)]
mod fetcher_test;
#[cfg(test)]
mod history_test;

pub use config::AppConfig;
pub use fetcher::Fetcher;
pub use history::HistoryStore;
