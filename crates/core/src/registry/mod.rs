pub mod client;
pub mod room;

pub use client::ClientRegistry;
pub use room::RoomRegistry;
