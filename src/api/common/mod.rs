//! Response emitters shared by the chat handler.

mod non_streaming;
mod streaming;

pub(crate) use non_streaming::handle_non_streaming_request;
pub(crate) use streaming::handle_streaming_request;
