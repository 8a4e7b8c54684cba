//! Command implementations.

pub mod extract;
pub mod plan;
pub mod show;
pub mod status;

pub use extract::execute_extract;
pub use plan::execute_plan;
pub use show::execute_show;
pub use status::execute_status;
