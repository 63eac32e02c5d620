//! Album Select - picks a random dated photo album for picture frames
//!
//! Folders named `YYYY-MM-<name>` under the album root are candidates. The
//! [AlbumPicker](services::AlbumPicker) chooses one on a schedule and on
//! demand; the HTTP API exposes the choice as a sensor value with attributes.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod jobs;
pub mod services;
