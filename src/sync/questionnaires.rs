/// Upload of locally stored questionnaires and patient metadata
///
/// A questionnaire is removed from the device only after its remote write
/// succeeded. If the process dies between the two the entry is sent again on
/// the next run.

use tracing::warn;

use crate::domain::UserId;
use crate::remote::{paths, DocumentStore, WriteMode};
use crate::storage::{LocalStore, PatientStorage, QuestionnaireStorage};
use crate::sync::run::SyncRun;

/// Outcome of the questionnaire step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionnaireReport {
    pub sent: usize,
    pub failed: usize,
}

/// Merge the patient profile into the remote metadata document
///
/// Best effort: failures are logged and the sync carries on.
pub async fn upload_patient_metadata(
    local: &dyn LocalStore,
    documents: &dyn DocumentStore,
    user: &UserId,
    run: &SyncRun,
) -> bool {
    let profile = match local.load_patient() {
        Ok(profile) => profile,
        Err(e) => {
            run.log(format!("Could not read patient profile: {}", e));
            return false;
        }
    };
    if profile.is_empty() {
        run.log("No patient profile to upload");
        return false;
    }

    match documents
        .set(&paths::patient_meta_path(user), profile.to_document(), WriteMode::Merge)
        .await
    {
        Ok(()) => {
            run.log("Uploaded patient metadata");
            true
        }
        Err(e) => {
            run.log(format!("Failed to upload patient metadata: {}", e));
            false
        }
    }
}

/// Send every stored questionnaire and delete the ones that were written
pub async fn upload_questionnaires(
    local: &dyn LocalStore,
    documents: &dyn DocumentStore,
    user: &UserId,
    run: &SyncRun,
) -> QuestionnaireReport {
    let mut report = QuestionnaireReport::default();

    let entries = match local.load_questionnaires() {
        Ok(entries) => entries,
        Err(e) => {
            run.log(format!("Could not read stored questionnaires: {}", e));
            return report;
        }
    };
    if entries.is_empty() {
        run.log("No questionnaires to upload");
        return report;
    }

    let collection = paths::questionnaires_collection(user);
    for entry in entries {
        match documents.add(&collection, entry.to_document()).await {
            Ok(remote_id) => {
                report.sent += 1;
                if let Err(e) = local.delete_questionnaire(&entry.id) {
                    // Sent but still stored: it will be sent again next time
                    warn!("Questionnaire {} uploaded but not removed locally: {}", entry.id, e);
                }
                tracing::debug!("Questionnaire {} stored remotely as {}", entry.id, remote_id);
            }
            Err(e) => {
                report.failed += 1;
                run.log(format!("Failed to upload questionnaire {}: {}", entry.id, e));
            }
        }
    }

    run.log(format!("Sent {} questionnaires", report.sent));
    report
}
