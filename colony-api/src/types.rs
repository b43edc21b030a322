use std::any::Any;
use std::sync::Arc;

// Type aliases for common types
pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type PanicPayload = Box<dyn Any + Send + 'static>;
pub type PanicHandler = Arc<dyn Fn(PanicPayload) + Send + Sync + 'static>;
