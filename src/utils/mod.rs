pub mod constants;
pub mod logging;
pub mod version;
