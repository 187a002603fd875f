pub mod host;
pub mod messages;
pub mod monitor;
pub mod router;
pub mod routing_table;

pub use host::*;
pub use messages::*;
pub use monitor::*;
pub use router::*;
pub use routing_table::*;
