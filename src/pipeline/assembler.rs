//! Grounding context assembly: system prompt text plus inline images.
use std::sync::Arc;

use tracing::debug;

use crate::error::RagError;
use crate::models::{GroundingContext, RetrievedRecord};
use crate::storage::ObjectStore;

/// Instruction placed before the retrieved evidence. Kept byte-for-byte
/// compatible with the prompt the deployed model was tuned against.
pub const GROUNDING_INSTRUCTION: &str = "'検索結果'と画像の情報のみを使って回答してください。分からない場合は「分かりません」と回答してください。 入力文は以下の通りです。:\n";

/// Render the system prompt: instruction, then one block per record in order.
pub fn build_system_prompt(records: &[RetrievedRecord]) -> String {
    let mut prompt = String::from(GROUNDING_INSTRUCTION);
    for record in records {
        prompt.push_str("File: ");
        prompt.push_str(&record.file_name);
        prompt.push_str("\nContent: ");
        prompt.push_str(&record.content);
        prompt.push_str("\n\n");
    }
    prompt
}

pub struct ContextAssembler {
    store: Arc<dyn ObjectStore>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Build the grounding context for `records`.
    ///
    /// Every image-bearing record has its blob fetched, one at a time in
    /// record order. Any fetch failure aborts the whole assembly.
    pub async fn assemble(&self, records: &[RetrievedRecord]) -> Result<GroundingContext, RagError> {
        let mut images = Vec::new();
        for path in records.iter().filter_map(RetrievedRecord::image_path) {
            let encoded = self
                .store
                .fetch_base64(path)
                .await
                .map_err(|source| RagError::StorageFailed {
                    path: path.to_string(),
                    source,
                })?;
            debug!("fetched image {path} ({} base64 bytes)", encoded.len());
            images.push(encoded);
        }

        Ok(GroundingContext {
            system_prompt: build_system_prompt(records),
            images,
        })
    }
}
