pub mod batch;
pub mod brevo;
pub mod config;
pub mod error;
pub mod loader;
pub mod mailer;
pub mod sent_folder;
pub mod sink;
pub mod telemetry;
pub mod uploader;
