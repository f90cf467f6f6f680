pub mod batch;
pub mod calendar;
pub mod config;
pub mod discover;
pub mod join;
pub mod stats;
pub mod table;
pub mod utils;
