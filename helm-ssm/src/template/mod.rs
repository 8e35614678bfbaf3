pub mod driver;
pub mod functions;
pub mod helpers;

pub use driver::{RenderOptions, execute_template, render_files, write_file, write_file_to_dir};
pub use functions::{FunctionConfig, FunctionTable, SsmFunction};
