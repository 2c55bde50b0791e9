pub mod annotate;
pub mod biomart;
pub mod config;
pub mod crossref;
pub mod domain;
pub mod error;
pub mod homology;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod table;
pub mod tui;
