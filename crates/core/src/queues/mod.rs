pub mod isolated_forwarder;

pub use isolated_forwarder::*;
