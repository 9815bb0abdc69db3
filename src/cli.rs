use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Parser;
use tracing::{debug, info};

use crate::{
    error::{Result, TermChatError},
    gpt::{GptClient, GptClientOption, OpenAIModel},
    repl::GptRepl,
    secrets::{Secrets, DEFAULT_SECRETS_PATH},
};

#[derive(Parser, Debug)]
#[clap(version, about = "Chat with OpenAI models from the terminal")]
pub struct Gpt {
    /// Path to a file whose content is sent as the first message
    prompt_file: Option<PathBuf>,
    /// ChatGPT model: [3: for GPT3.5] or [4: for GPT4]
    #[clap(short = 'm', long = "model", default_value = "3")]
    model: GptVersion,
    #[clap(long = "secrets", default_value = DEFAULT_SECRETS_PATH)]
    secrets: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GptVersion {
    Gpt3,
    Gpt4,
}
impl FromStr for GptVersion {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "gpt3" | "3" => Ok(Self::Gpt3),
            "gpt4" | "4" => Ok(Self::Gpt4),
            _ => Err(format!("{} is not supported", s)),
        }
    }
}
impl GptVersion {
    fn display_name(&self) -> &'static str {
        match self {
            Self::Gpt3 => "GPT-3.5",
            Self::Gpt4 => "GPT-4",
        }
    }
}
impl From<GptVersion> for OpenAIModel {
    fn from(v: GptVersion) -> Self {
        match v {
            GptVersion::Gpt3 => Self::Gpt3Dot5Turbo,
            GptVersion::Gpt4 => Self::Gpt4,
        }
    }
}

impl Gpt {
    pub fn new() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        let model = OpenAIModel::from(self.model);
        println!("Using {}", self.model.display_name());
        info!(model = model.as_str(), "selected model");

        let secrets = Secrets::load(&self.secrets)?;
        let client = GptClient::new(secrets.openai_key(), GptClientOption::from_env())?;
        let mut repl = GptRepl::new(client, model);

        if let Some(path) = &self.prompt_file {
            let prompt = read_prompt_file(path)?;
            let stdout = std::io::stdout();
            repl.first_turn(prompt, &mut stdout.lock())?;
        }
        repl.repl()?;
        Ok(())
    }
}

/// Whole file content, unaltered, as a single prompt.
fn read_prompt_file(path: &Path) -> Result<String> {
    let prompt = std::fs::read_to_string(path).map_err(|source| TermChatError::PromptFile {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), prompt = prompt.as_str(), "read prompt file");
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn cliはデフォルトでgpt3を利用する() {
        let sut = Gpt::parse_from(["termchat"]);

        assert_eq!(sut.model, GptVersion::Gpt3);
        assert_eq!(sut.prompt_file, None);
        assert_eq!(sut.secrets, PathBuf::from("secrets/secrets.json"));
    }
    #[test]
    fn cliはgpt4か選択できる() {
        let short = Gpt::parse_from(["termchat", "-m", "4"]);
        let long = Gpt::parse_from(["termchat", "--model", "gpt4"]);

        assert_eq!(short.model, GptVersion::Gpt4);
        assert_eq!(long.model, GptVersion::Gpt4);
        assert_eq!(OpenAIModel::from(short.model), OpenAIModel::Gpt4);
    }
    #[test]
    fn cliは未対応のmodelを拒否する() {
        assert!(Gpt::try_parse_from(["termchat", "-m", "5"]).is_err());
    }
    #[test]
    fn cliはprompt_fileとsecretsを受け取れる() {
        let sut = Gpt::parse_from(["termchat", "prompt.txt", "--secrets", "my/secrets.json"]);

        assert_eq!(sut.prompt_file, Some(PathBuf::from("prompt.txt")));
        assert_eq!(sut.secrets, PathBuf::from("my/secrets.json"));
    }
    #[test]
    fn prompt_fileの内容はそのまま読み込まれる() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all("Summarize this.".as_bytes()).unwrap();

        assert_eq!(read_prompt_file(file.path()).unwrap(), "Summarize this.");
    }
    #[test]
    fn prompt_fileが存在しない場合はエラー() {
        let dir = tempfile::tempdir().unwrap();

        let err = read_prompt_file(&dir.path().join("missing.txt")).unwrap_err();

        assert!(matches!(err, TermChatError::PromptFile { .. }));
    }
    #[test]
    fn secretsが存在しない場合runはエラーになる() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("secrets.json");
        let sut = Gpt::parse_from(["termchat", "--secrets", secrets.to_str().unwrap()]);

        assert!(matches!(sut.run(), Err(TermChatError::Secrets(_))));
    }
}
