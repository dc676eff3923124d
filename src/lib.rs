pub mod configuration;
pub mod data_capture;
pub mod error_handling;
pub mod gateway;
pub mod session_management;
pub mod web_interface;

pub use session_management::session_manager::TraceStore;
pub use session_management::SessionStatus;
