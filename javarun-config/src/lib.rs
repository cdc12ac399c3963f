pub mod profile;

pub use profile::{load_config, parse_config, InvokerProfile};
