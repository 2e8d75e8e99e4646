pub mod errors;
pub mod quiz;
pub mod responses;
pub mod router;
pub mod state;
pub mod uploads;

pub use errors::RequestError;
pub use responses::{ApiError, HealthStatus, UploadSuccess, json_error};
pub use state::AppState;
pub use uploads::{StagedFile, ensure_upload_dir, stage_upload};
