pub mod database;
pub mod docker;
pub mod files;
