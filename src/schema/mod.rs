pub mod paths;
pub mod registry;

pub use registry::{JsonSchemaRegistry, SchemaValidator};
