pub mod config;
pub mod error;
pub mod io;
pub mod template;

pub use config::Config;
pub use error::{CoreError, Result};
pub use template::{ReportFormat, TemplateRegistry};
