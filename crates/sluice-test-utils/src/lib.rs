pub mod harness;
pub mod mock;

pub use harness::TestProject;
pub use mock::MockScheduler;
