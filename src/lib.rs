//! pdfoid: an HTML to PDF rendering service driving headless Chrome.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
