pub mod replies;
pub mod sse;
pub mod tool_calls;

pub use replies::{next_reply, Reply};
pub use sse::{done_frame, error_sse_frame, json_sse_frame, openai_sse_frame};
pub use tool_calls::ToolCallAccumulator;
