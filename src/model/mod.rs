//! Value domain and FHIR model projection.

pub mod equality;
pub mod provider;
pub mod quantity;
pub mod resource_node;
pub mod temporal;
pub mod types;
pub mod value;

pub use equality::{deep_equal, deep_equivalent, distinct, is_distinct};
pub use provider::{InMemoryModelProvider, ModelProvider, NoopModelProvider};
pub use quantity::Quantity;
pub use resource_node::ResourceNode;
pub use temporal::{PartialDate, PartialDateTime, PartialTime, TemporalOrdering};
pub use types::{QualifiedType, matches_system_type, system_type_of};
pub use value::{Collection, FhirPathValue};
