pub mod test_app;
pub mod ws_client;

pub use test_app::{make_token, TestApp};
pub use ws_client::WsClient;
