use serde::Deserialize;
use serde_json::Value;

/// Error body returned by the table API (`code`) or the storage API
/// (`statusCode`, `error`).
#[derive(Deserialize, Debug, Default)]
pub struct RemoteErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Response of a storage object upload.
#[derive(Deserialize, Debug)]
pub struct UploadResp {
    #[serde(rename = "Key")]
    pub key: Option<String>,
}
