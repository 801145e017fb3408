mod file_registry;
mod model;
mod redis_registry;

pub use file_registry::*;
pub use model::*;
pub use redis_registry::*;
