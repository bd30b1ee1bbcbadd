pub mod catalog_service;
pub mod import_job_service;
pub mod normalizer;
pub mod pdf_extraction_service;
pub mod vocabulary_service;

pub use catalog_service::CatalogService;
pub use import_job_service::ImportJobStore;
pub use pdf_extraction_service::PdfExtractionService;
pub use vocabulary_service::VocabularyService;
