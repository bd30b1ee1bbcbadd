pub mod drug;
pub mod ingredient;
pub mod pdf_import;
