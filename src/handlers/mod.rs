pub mod catalog;
pub mod ingredients;
pub mod pdf_import;
