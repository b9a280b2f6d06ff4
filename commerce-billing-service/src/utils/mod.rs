pub mod datetime;
pub mod decimal;
pub mod validation;

pub use decimal::round_to;
pub use validation::{ValidatedJson, ValidatedQuery};
