pub mod error;
pub mod ids;
pub mod parameter;
pub mod value;

pub use error::CoreError;
pub use ids::*;
pub use parameter::{Parameter, ParameterFilter, ParameterSet, ParameterValue, ScopeRelation};
pub use value::ConfigValue;
