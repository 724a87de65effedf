pub mod handler;
pub mod stage;

pub use handler::{handler_fn, FnHandler, TaskHandler};
pub use stage::Stage;
