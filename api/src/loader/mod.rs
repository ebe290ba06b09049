pub mod subscribers;
pub mod templates;
