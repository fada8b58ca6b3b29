pub mod settings;

pub use settings::{
    AppSettings, AuthSettings, IceServer, ListenIp, RecorderSettings, RoomDefaults,
    SfuSettings, Settings, TurnSettings,
};
