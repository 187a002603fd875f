pub mod discovery;
pub mod simulation;
pub mod topology;
pub mod transport;

pub use discovery::*;
pub use simulation::*;
pub use topology::*;
pub use transport::*;
