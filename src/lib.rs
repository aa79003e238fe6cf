pub mod config;
pub mod data;
pub mod daybook;
pub mod text;
