pub mod catalog;
pub mod extracted_titles;
pub mod imports;
pub mod title_matches;
