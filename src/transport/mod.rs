mod relay;

pub use relay::{
    authenticate, client_metadata, connect, RelayConnection, WsStream,
};

#[cfg(test)]
pub(crate) use relay::test_support;
