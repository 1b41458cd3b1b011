pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod utils;

pub use config::Settings;
pub use error::{AppError, AppResult};
pub use logging::init_logger;
pub use utils::{escape_html, format_duration, format_size, format_time, is_valid_url};
