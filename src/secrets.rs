use std::path::{Path, PathBuf};

use tracing::debug;

use crate::gpt::OpenAIKey;

pub const DEFAULT_SECRETS_PATH: &str = "secrets/secrets.json";

#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Not read secrets file. File is : {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Not parse secrets file. File is : {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("openai_key is empty in {}", path.display())]
    EmptyKey { path: PathBuf },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Secrets {
    openai_key: OpenAIKey,
}
impl Secrets {
    /// Reads the whole credentials file once; nothing is held open afterwards.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SecretsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SecretsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let secrets: Self = serde_json::from_str(&raw).map_err(|source| SecretsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if secrets.openai_key.is_blank() {
            return Err(SecretsError::EmptyKey {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), "loaded secrets");
        Ok(secrets)
    }
    pub fn openai_key(&self) -> OpenAIKey {
        self.openai_key.clone()
    }
}
