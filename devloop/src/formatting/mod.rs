//! Terminal output helpers.

mod headers;
mod output;
mod status;

pub use headers::{print_section_header, SectionStyle};
pub use output::{format_task, print_key_value};
pub use status::{print_error, print_success, print_warning, Status};
