pub mod kafka;
pub mod managed_kafka;
pub mod status;

pub use kafka::*;
pub use managed_kafka::*;
pub use status::*;
