use crate::retry::RetryPolicy;
use crate::runs::RunSlotPolicy;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Tunables of the pipeline: 5 MB upload cap, 3 storage attempts,
/// 3 generation attempts and reject-on-conflict run slots by default.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_upload_bytes: u64,
    pub allowed_media_types: Vec<String>,
    /// Applied to object storage writes
    pub storage_retry: RetryPolicy,
    /// Applied to LLM attempts, schema violations included
    pub generation_retry: RetryPolicy,
    pub run_slot_policy: RunSlotPolicy,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub default_actor: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_media_types: vec![
                "application/pdf".to_string(),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .to_string(),
                "text/plain".to_string(),
                "application/json".to_string(),
            ],
            storage_retry: RetryPolicy::default(),
            generation_retry: RetryPolicy::new(3, 500, 10_000),
            run_slot_policy: RunSlotPolicy::Reject,
            model: "gemini-1.5-pro".to_string(),
            max_tokens: 4000,
            temperature: 0.3,
            default_actor: "anonymous".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn media_type_allowed(&self, media_type: &str) -> bool {
        self.allowed_media_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_list() {
        let config = PipelineConfig::default();
        assert!(config.media_type_allowed("text/plain"));
        assert!(config.media_type_allowed("application/pdf"));
        assert!(config.media_type_allowed("APPLICATION/JSON"));
        assert!(!config.media_type_allowed("image/png"));
    }
}
