pub mod record;
pub mod formatter;
mod finite;
pub mod layer;

pub mod env;
pub mod init;

pub use formatter::{DataModelFormatter, FormatError};
pub use layer::DataModelFormat;
pub use record::{Level, LogRecord};
