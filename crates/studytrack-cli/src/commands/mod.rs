pub mod session;
pub mod stats;
pub mod subject;
pub mod task;
pub mod timer;
