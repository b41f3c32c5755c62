//! PaperHound PDF Resolver
//!
//! Locates a full-text PDF for a paper through a fixed waterfall of five
//! providers, keeps validated PDFs in an on-disk cache and extracts their
//! text. Not-found, transient provider failures and rejected downloads are
//! absorbed here; callers always receive a finalized resolution record.

pub mod cache;
pub mod download;
pub mod errors;
pub mod orchestrator;
pub mod pdf;
pub mod providers;

#[cfg(test)]
mod test_support;

pub use cache::{PdfCache, ValidationPolicy};
pub use download::{HttpDownloader, PdfDownloader};
pub use errors::ResolverError;
pub use orchestrator::{ExtractedText, PdfResolutionRecord, PdfResolver, PdfSource};
pub use pdf::PdfInfo;
pub use providers::{PdfProvider, ProviderName, ProviderOutcome};
