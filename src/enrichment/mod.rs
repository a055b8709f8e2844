//! Company context for qualified leads.
//!
//! A lead's website is read as markdown through a reader service
//! ([`PageReader`]) and summarized by the fast model into
//! [`EnrichmentData`], which drafting folds into its prompt.

pub mod errors;
pub mod reader;
pub mod summary;

pub use errors::EnrichmentError;
pub use reader::{company_url, JinaReader, PageReader};
pub use summary::{summarize_company, EnrichmentData, SUMMARIZE_ACTION};
