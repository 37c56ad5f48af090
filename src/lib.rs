pub mod browser;
pub mod client;
pub mod config;
pub mod error;
pub mod fields;
pub mod orchestrator;
pub mod page;
pub mod profile;
pub mod server;
pub mod store;

pub use browser::Browser;
pub use client::FillClient;
pub use config::BrowserConfig;
pub use error::{Error, Result};
pub use fields::{AnswerMap, FieldDescriptor, FillRequest};
pub use orchestrator::{fill, FillOutcome, FormTarget};
pub use page::Page;
pub use profile::Profile;
