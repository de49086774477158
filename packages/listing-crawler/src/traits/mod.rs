//! Trait seams between the crawl core and its collaborators.

pub mod fetcher;
