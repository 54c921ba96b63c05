//! Auxiliary output generated from build data.
//!
//! - **Sitemap**: search engine indexing (`sitemap.xml`)

pub mod sitemap;
