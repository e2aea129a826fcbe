//! Embedding transform: tokenizes a chunk and runs it through a
//! transformer encoder, pooling the first token's hidden state (CLS-style
//! pooling, matching the original embedder's
//! `last_hidden_state[:, 0]`).

use std::path::PathBuf;

use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use corpusforge_core::error::Error;
use corpusforge_core::stage::Transform;
use corpusforge_core::types::{Chunk, Embedding};
use hf_hub::api::tokio::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::{PaddingParams, Tokenizer};

/// Loaded BERT-family encoder plus the tokenizer it was trained with.
pub struct EmbedTransform {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl EmbedTransform {
    /// Downloads (or reuses the local hf-hub cache for) the tokenizer and
    /// weights for `model_id`, and builds the encoder on `device`.
    pub async fn load(model_id: &str, device: Device) -> Result<Self, Error> {
        let api = Api::new().map_err(|e| Error::Other(e.into()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path: PathBuf = repo
            .get("config.json")
            .await
            .map_err(|e| Error::Other(e.into()))?;
        let tokenizer_path: PathBuf = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| Error::Other(e.into()))?;
        let weights_path: PathBuf = repo
            .get("model.safetensors")
            .await
            .map_err(|e| Error::Other(e.into()))?;

        let config: BertConfig = serde_json::from_slice(
            &std::fs::read(&config_path).map_err(|e| Error::Other(e.into()))?,
        )
        .map_err(Error::MalformedJson)?;

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| Error::Other(anyhow::anyhow!(e)))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| Error::Other(e.into()))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| Error::Other(e.into()))?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }
}

#[async_trait]
impl Transform<Chunk, Embedding> for EmbedTransform {
    async fn apply(&self, input: Chunk) -> Result<Vec<Embedding>, Error> {
        let encoding = self
            .tokenizer
            .encode(input, true)
            .map_err(|e| Error::Other(anyhow::anyhow!(e)))?;

        let token_ids = Tensor::new(encoding.get_ids(), &self.device)
            .map_err(|e| Error::Other(e.into()))?
            .unsqueeze(0)
            .map_err(|e| Error::Other(e.into()))?;
        let token_type_ids = token_ids
            .zeros_like()
            .map_err(|e| Error::Other(e.into()))?;

        let output = self
            .model
            .forward(&token_ids, &token_type_ids, None)
            .map_err(|e| Error::Other(e.into()))?;

        // CLS-style pooling: take the first token's hidden state.
        let cls = output
            .i((.., 0, ..))
            .map_err(|e| Error::Other(e.into()))?
            .squeeze(0)
            .map_err(|e| Error::Other(e.into()))?
            .to_dtype(DType::F32)
            .map_err(|e| Error::Other(e.into()))?;

        let embedding: Vec<f32> = cls.to_vec1().map_err(|e| Error::Other(e.into()))?;
        Ok(vec![embedding])
    }
}
