mod message;
mod tool;

pub use message::{Message, Role, ToolCallRequest, ToolCallResult};
pub use tool::{Tool, ToolDescriptor};
