use std::path::PathBuf;

use crate::{gpt::GptClientError, repl::ReplError, secrets::SecretsError};

#[derive(Debug, thiserror::Error)]
pub enum TermChatError {
    #[error(transparent)]
    Secrets(#[from] SecretsError),
    #[error(transparent)]
    Client(#[from] GptClientError),
    #[error(transparent)]
    Repl(#[from] ReplError),
    #[error("Not read prompt file. File is : {}", path.display())]
    PromptFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TermChatError>;

/// Formats an error followed by every `source()` in its chain.
pub fn report(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = format!("error: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reportはsourceの原因まで表示する() {
        let err = TermChatError::from(SecretsError::Read {
            path: PathBuf::from("secrets/secrets.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        });

        assert_eq!(
            report(&err),
            "error: Not read secrets file. File is : secrets/secrets.json\n  caused by: No such file"
        );
    }
    #[test]
    fn replのio_errorも原因を表示する() {
        let err = TermChatError::from(ReplError::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        )));

        assert_eq!(
            report(&err),
            "error: console io error\n  caused by: broken pipe"
        );
    }
}
