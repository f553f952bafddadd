use serde::Serialize;

/// Everything a provider needs to run one indexing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRequest {
    pub job_id: String,
    #[serde(rename = "drive_folder_id")]
    pub folder_id: String,
    pub event_name: String,
    pub owner_id: String,
    /// Where the runner must POST its result.
    pub callback_url: String,
}

impl DispatchRequest {
    /// Environment handed to a runner process, in the variable names the
    /// runner reads.
    pub fn env_vars(&self) -> [(&'static str, &str); 5] {
        [
            ("JOB_ID", self.job_id.as_str()),
            ("DRIVE_FOLDER_ID", self.folder_id.as_str()),
            ("EVENT_NAME", self.event_name.as_str()),
            ("OWNER_ID", self.owner_id.as_str()),
            ("CALLBACK_URL", self.callback_url.as_str()),
        ]
    }
}
