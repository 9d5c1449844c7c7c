pub mod backoff;
pub mod cache;
pub mod command;
pub mod interval;
pub mod selector;
pub mod series;
