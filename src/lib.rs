#![forbid(unsafe_code)]

pub mod cli;
pub mod corpus;
pub mod crawl;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod item;
pub mod languages;
pub mod logging;
pub mod rate_limit;
pub mod selectors;
