//! Album picker, service lifecycle and HTTP serving

pub mod album_picker;
pub mod http_server;
pub mod logging;
pub mod manager;

pub use album_picker::{
    AlbumCandidate, AlbumPicker, AlbumPickerConfig, AlbumSelection, AlbumSensor, ScanError,
    SelectionResult,
};
pub use http_server::{HttpServerConfig, HttpServerService};
pub use manager::{Service, ServiceHealth, ServicesManager};
