pub mod bridge;
pub mod executor;
pub mod process;

pub use bridge::JavaBridge;
pub use executor::Invoker;
pub use process::ProcessConfig;
