pub mod pdf_loader;
pub mod run_store;

pub use pdf_loader::PdfLoader;
pub use run_store::RunStore;
