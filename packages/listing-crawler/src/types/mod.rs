//! Data types shared across the crawler.

pub mod config;
pub mod page;
pub mod record;
pub mod summary;
