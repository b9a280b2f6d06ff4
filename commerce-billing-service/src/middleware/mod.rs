pub mod capability_check;

pub use capability_check::{capabilities, AuthContext, CapabilityChecker};
