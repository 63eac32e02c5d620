//! Album refresh job

use std::sync::Arc;

use anyhow::Result;

use crate::services::album_picker::AlbumPicker;

/// Pick a new album. Missing or unreadable roots are recorded on the sensor
/// rather than returned here.
pub async fn run_refresh(picker: Arc<AlbumPicker>) -> Result<()> {
    picker.refresh().await?;
    tracing::debug!(state = ?picker.current_state(), "Album refresh completed");
    Ok(())
}
