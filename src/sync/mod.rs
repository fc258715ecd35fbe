/// Health data synchronization pipeline
///
/// A `SyncRun` is created per invocation and passed to the orchestrator, which
/// uploads questionnaires and then runs one `MetricUploader` per metric.

pub mod run;
pub mod watermark;
pub mod uploader;
pub mod questionnaires;
pub mod orchestrator;

pub use run::{CancelFlag, SyncEvent, SyncRun};
pub use watermark::{effective_start_from, WatermarkStore};
pub use uploader::{MetricUploader, UploadReport, UploadTarget};
pub use questionnaires::{upload_patient_metadata, upload_questionnaires, QuestionnaireReport};
pub use orchestrator::{
    IdentityProvider, StaticIdentity, SyncOrchestrator, SyncSettings, SyncStatus, SyncSummary,
};
