//! Command implementations.

mod info;
mod stream;
mod submit;
mod validate;

pub use info::run_info;
pub use stream::run_stream;
pub use submit::run_submit;
pub use validate::run_validate;
