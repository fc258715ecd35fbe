/// Document path layout
///
/// ```text
/// patients/
/// └── <user-id>/
///     ├── healthData/<metric>/daily/<yyyy-MM-dd>   one document per day, upserted
///     ├── questionnaires/<auto-id>                  append-only
///     └── meta/
///         ├── uploadTracking                        per-metric watermarks
///         └── meta                                  patient profile
/// ```

use crate::domain::{DayKey, MetricType, UserId};
use crate::remote::RemoteError;

/// Root collection of all patient data
pub const PATIENTS: &str = "patients";

/// Document id of the watermark record
pub const UPLOAD_TRACKING: &str = "uploadTracking";

/// Document id of the profile metadata record
pub const PATIENT_META: &str = "meta";

/// Build the root path of one patient
pub fn patient_root(user: &UserId) -> String {
    format!("{}/{}", PATIENTS, user.as_str())
}

/// Build the path of one day's aggregate for a metric
pub fn daily_health_path(user: &UserId, metric: MetricType, day: DayKey) -> String {
    format!(
        "{}/healthData/{}/daily/{}",
        patient_root(user),
        metric.identifier(),
        day
    )
}

/// Build the questionnaire collection path
pub fn questionnaires_collection(user: &UserId) -> String {
    format!("{}/questionnaires", patient_root(user))
}

/// Build the watermark document path
pub fn upload_tracking_path(user: &UserId) -> String {
    format!("{}/meta/{}", patient_root(user), UPLOAD_TRACKING)
}

/// Build the profile metadata document path
pub fn patient_meta_path(user: &UserId) -> String {
    format!("{}/meta/{}", patient_root(user), PATIENT_META)
}

/// Strip surrounding slashes and reject empty segments
pub fn normalize(path: &str) -> Result<String, RemoteError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|segment| segment.trim().is_empty()) {
        return Err(RemoteError::InvalidPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}
