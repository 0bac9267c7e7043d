pub mod errors;
pub mod mapper;
pub mod models;
pub mod protocol;

pub use errors::*;
pub use mapper::*;
pub use models::*;
pub use protocol::*;
