use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Value of the `event` field that announces the file-edit phase.
pub const FILE_EDIT_START_EVENT: &str = "file_edit_start";

/// One decoded unit of the generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental fragment of assistant output.
    Token(String),
    /// Server-reported failure; aborts the whole response.
    Error(String),
    RetrievedPaths(Vec<String>),
    UpdatedFileContents(BTreeMap<String, UpdateFileContent>),
    NewFiles(NewFilesData),
    FileEditStart,
    /// An object with none of the known keys. Ignored by the streamer.
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFileContent {
    #[serde(default)]
    pub updated_content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<String>,
}

impl UpdateFileContent {
    /// First error string that is not blank, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.errors
            .iter()
            .map(|e| e.trim())
            .find(|e| !e.is_empty())
    }

    pub fn has_content(&self) -> bool {
        !self.updated_content.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFilesData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub new_content: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub new_file_paths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<String>,
}

impl NewFilesData {
    /// Fills `new_file_paths` from the content keys when the server left it empty.
    pub fn with_synthesized_paths(mut self) -> Self {
        if self.new_file_paths.is_empty() && !self.new_content.is_empty() {
            self.new_file_paths = self.new_content.keys().cloned().collect();
        }
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResponseMode {
    #[default]
    Default,
    Chat,
    PureChat,
    AnswerOnly,
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Default => "default",
            ResponseMode::Chat => "chat",
            ResponseMode::PureChat => "pure-chat",
            ResponseMode::AnswerOnly => "answer-only",
        }
    }

    pub fn is_answer_only(self) -> bool {
        self == ResponseMode::AnswerOnly
    }

    /// Only the default mode writes patches and new files.
    pub fn materializes_files(self) -> bool {
        self == ResponseMode::Default
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MatchStrength {
    High,
    #[default]
    Mid,
    Low,
}

impl MatchStrength {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStrength::High => "high",
            MatchStrength::Mid => "mid",
            MatchStrength::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AmplificationLevel {
    #[default]
    Off,
    Low,
    Mid,
    High,
}

impl AmplificationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AmplificationLevel::Off => "off",
            AmplificationLevel::Low => "low",
            AmplificationLevel::Mid => "mid",
            AmplificationLevel::High => "high",
        }
    }
}

/// Body of `POST /generate-response/`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub project: String,
    pub mode: String,
    pub model: String,
    pub match_strength: String,
    pub llm_model_api_key: String,
    pub llm_model_api_key_other: String,
    pub llm_model_base_url: String,
    pub llm_model_base_url_other: String,
    pub codehost_api_key: String,
    pub codehost_url: String,
    pub ignore_files: Vec<String>,
    pub head_commit_hash: String,
}

/// Shared body of `/add-repository/` and `/fetch-and-checkout/`.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryRequest {
    pub codehost_url: String,
    pub project_name: String,
    pub vcs_type: String,
    pub api_key: Option<String>,
    pub llm_model_api_key: String,
    pub llm_model_base_url: String,
    pub llm_model: String,
    pub ignore_files: Vec<String>,
    pub head: String,
    pub use_mock_llm: bool,
    pub amplification_level: String,
    pub depth_level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_threads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_oid: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteStoreRequest {
    pub project_name: String,
    pub codehost_url: String,
    pub vcs_type: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenCountRequest {
    pub codehost_url: String,
    pub project_name: String,
    pub vcs_type: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AddRepositoryResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub api_key_provided: bool,
    #[serde(default)]
    pub llm_model_api_key_provided: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub branch_name: String,
    #[serde(default)]
    pub project_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeleteStoreResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub lock_file_present: bool,
    #[serde(default)]
    pub lock_time_duration: f64,
    #[serde(default)]
    pub error_logs: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenCountResponse {
    #[serde(default)]
    pub embedding_tokens: u64,
    #[serde(default)]
    pub inference_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InstallInfo {
    pub head_oid: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FilenameResponse {
    #[serde(default)]
    pub filename: String,
}
