use std::io::{BufRead, Write};

use tracing::{debug, info};

use crate::gpt::{
    ChatCompletion, ConversationSession, GptClient, GptClientError, Message, OpenAIModel,
};

pub trait Chat {
    fn complete(
        &mut self,
        model: OpenAIModel,
        messages: &[Message],
    ) -> Result<ChatCompletion, GptClientError>;
}

impl Chat for GptClient {
    fn complete(
        &mut self,
        model: OpenAIModel,
        messages: &[Message],
    ) -> Result<ChatCompletion, GptClientError> {
        GptClient::complete(self, model, messages)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplError {
    #[error("console io error")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Client(#[from] GptClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Answered,
    Retry,
    Eof,
}

pub struct GptRepl<C: Chat> {
    chat: C,
    session: ConversationSession,
    model: OpenAIModel,
}

impl<C: Chat> GptRepl<C> {
    const RESET_SENTINEL: char = '!';
    const SEPARATOR: &'static str = "--------------------------------------------------------";
    pub fn new(chat: C, model: OpenAIModel) -> Self {
        Self {
            chat,
            session: ConversationSession::new(),
            model,
        }
    }
    pub fn session(&self) -> &ConversationSession {
        &self.session
    }
    /// Sends a whole block of text (e.g. a prompt file) as one user turn.
    pub fn first_turn<W: Write>(&mut self, prompt: String, out: &mut W) -> Result<(), ReplError> {
        self.send(prompt, out)?;
        Self::print_end(out)
    }
    pub fn repl(&mut self) -> Result<(), ReplError> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        self.repl_with(&mut stdin.lock(), &mut stdout.lock())
    }
    pub fn repl_with<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        out: &mut W,
    ) -> Result<(), ReplError> {
        loop {
            if self.read_eval(input, out)? == Step::Eof {
                writeln!(out)?;
                return Ok(());
            }
        }
    }
    fn read_eval<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        out: &mut W,
    ) -> Result<Step, ReplError> {
        Self::user_first(out)?;
        let Some(line) = Self::user_input(input)? else {
            return Ok(Step::Eof);
        };
        let mut message = line.as_str();
        if message.is_empty() {
            return Self::retry(out);
        }
        if let Some(rest) = message.strip_prefix(Self::RESET_SENTINEL) {
            info!("reset conversation");
            self.session.reset();
            message = rest;
            if message.is_empty() {
                return Self::retry(out);
            }
        }
        self.send(message.to_string(), out)?;
        Self::print_end(out)?;
        Ok(Step::Answered)
    }
    fn send<W: Write>(&mut self, message: String, out: &mut W) -> Result<(), ReplError> {
        self.session.append_user(message);
        debug!(transcript = self.session.len(), "waiting for completion");
        let completion = self.chat.complete(self.model, self.session.render())?;
        let reply = completion.reply_text()?.to_string();
        self.session.append_assistant(reply.as_str());
        info!(
            prompt_tokens = completion.usage.prompt_tokens,
            completion_tokens = completion.usage.completion_tokens,
            total_tokens = completion.usage.total_tokens,
            "completion received"
        );
        write!(out, "\n\nASSISTANT\n: {}\n", reply)?;
        writeln!(out, "{}", completion.usage)?;
        Ok(())
    }
    fn user_first<W: Write>(out: &mut W) -> Result<(), ReplError> {
        write!(out, "\n\nUSER: ")?;
        out.flush()?;
        Ok(())
    }
    fn user_input<R: BufRead>(input: &mut R) -> Result<Option<String>, ReplError> {
        let mut message = String::new();
        if input.read_line(&mut message)? == 0 {
            return Ok(None);
        }
        let len = match message.strip_suffix('\n') {
            Some(line) => line.strip_suffix('\r').unwrap_or(line).len(),
            None => message.len(),
        };
        message.truncate(len);
        Ok(Some(message))
    }
    fn retry<W: Write>(out: &mut W) -> Result<Step, ReplError> {
        writeln!(out, "Say something!")?;
        Ok(Step::Retry)
    }
    fn print_end<W: Write>(out: &mut W) -> Result<(), ReplError> {
        writeln!(out, "{}", Self::SEPARATOR)?;
        out.flush()?;
        Ok(())
    }
}
