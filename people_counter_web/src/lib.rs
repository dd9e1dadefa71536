pub mod analyzer;
pub mod api;
pub mod pages;
pub mod settings;
pub mod upload;
