pub mod error;
pub mod options;
pub mod resolver;

pub use error::ParameterError;
pub use options::ALLOWED_OPTIONS;
pub use resolver::resolve;
