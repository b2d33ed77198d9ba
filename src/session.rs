use crate::error::{RagError, Result};
use crate::gemini::TextGenerator;
use crate::prompt::{chat_prompt, rag_prompt};
use crate::retriever::Retriever;
use crate::utils::ensure_dir;
use std::fs::OpenOptions;
use std::io::{BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SENTINEL: &str = "/q";

pub enum Mode {
    /// Answers are grounded on the closest passage of the indexed corpus.
    Rag { retriever: Retriever, subject: String },
    /// Answers see the whole transcript so far as context.
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Lookup,
    Prompting,
    Closed,
}

pub struct Session {
    mode: Mode,
    generator: Box<dyn TextGenerator>,
    log_dir: PathBuf,
    transcript: Vec<String>,
    turn: usize,
    state: SessionState,
    query: String,
    passage: String,
}

impl Session {
    pub fn rag(
        retriever: Retriever,
        subject: impl Into<String>,
        generator: Box<dyn TextGenerator>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        let subject = subject.into();
        Self::new(Mode::Rag { retriever, subject }, generator, log_dir.into())
    }

    pub fn chat(generator: Box<dyn TextGenerator>, log_dir: impl Into<PathBuf>) -> Self {
        Self::new(Mode::Chat, generator, log_dir.into())
    }

    fn new(mode: Mode, generator: Box<dyn TextGenerator>, log_dir: PathBuf) -> Self {
        Session {
            mode,
            generator,
            log_dir,
            transcript: Vec::new(),
            turn: 1,
            state: SessionState::AwaitingInput,
            query: String::new(),
            passage: String::new(),
        }
    }

    /// Number of answered turns so far.
    pub fn turns_completed(&self) -> usize {
        self.turn - 1
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    fn reply_label(&self) -> &'static str {
        match self.mode {
            Mode::Rag { .. } => "RAG Chatbot",
            Mode::Chat => "Chatbot",
        }
    }

    /// Runs until the sentinel (or end of input) and returns the log path.
    ///
    /// A failed lookup or provider call ends the session with an error,
    /// after the transcript so far has been written.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<PathBuf> {
        self.open(&mut output)?;

        loop {
            match self.state {
                SessionState::AwaitingInput => self.await_input(&mut input, &mut output)?,
                SessionState::Lookup => {
                    if let Err(e) = self.lookup(&mut output) {
                        return Err(self.abort(e));
                    }
                }
                SessionState::Prompting => {
                    if let Err(e) = self.prompt(&mut output) {
                        return Err(self.abort(e));
                    }
                }
                SessionState::Closed => {
                    let path = self.write_log()?;
                    writeln!(output, "chat log file: {}", path.display())?;
                    writeln!(output, "Chat history saved. Exiting.")?;
                    return Ok(path);
                }
            }
        }
    }

    fn open<W: Write>(&mut self, output: &mut W) -> Result<()> {
        let banner = match &self.mode {
            Mode::Rag { subject, .. } => vec![
                format!("Welcome to Gemini RAG Chatbot ! ('{SENTINEL}' to exit)"),
                format!("Based on doc set of subject: '{subject}'"),
            ],
            Mode::Chat => vec![format!("Welcome to GeminiChatbot! ('{SENTINEL}' to exit)")],
        };
        for line in banner {
            self.say(output, line)?;
        }
        writeln!(output)?;
        Ok(())
    }

    fn await_input<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        write!(output, "{} You: ", self.turn)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            debug!("end of input, closing session");
            self.state = SessionState::Closed;
            return Ok(());
        }

        let query = line.trim();
        if query.is_empty() {
            return Ok(());
        }

        self.transcript.push(format!("{} You: {query}", self.turn));
        if query.eq_ignore_ascii_case(SENTINEL) {
            self.state = SessionState::Closed;
            return Ok(());
        }

        self.query = query.to_string();
        self.state = match self.mode {
            Mode::Rag { .. } => SessionState::Lookup,
            Mode::Chat => SessionState::Prompting,
        };
        Ok(())
    }

    fn lookup<W: Write>(&mut self, output: &mut W) -> Result<()> {
        let Mode::Rag { retriever, .. } = &self.mode else {
            self.state = SessionState::Prompting;
            return Ok(());
        };

        match retriever.retrieve(&self.query) {
            Ok(passage) => {
                debug!(%passage, "retrieved passage");
                self.passage = passage;
                self.state = SessionState::Prompting;
            }
            Err(e @ RagError::EmptyIndex(_)) => {
                warn!(error = %e, "lookup failed");
                let line = format!("{} {}: {e}", self.turn, self.reply_label());
                self.say(output, line)?;
                self.turn += 1;
                self.state = SessionState::AwaitingInput;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn prompt<W: Write>(&mut self, output: &mut W) -> Result<()> {
        let prompt = match self.mode {
            Mode::Rag { .. } => {
                let prompt = rag_prompt(&self.query, &self.passage);
                self.transcript.push(format!("{} Prompt: {prompt}", self.turn));
                prompt
            }
            Mode::Chat => {
                // the current user line is already the last entry
                let history = &self.transcript[..self.transcript.len().saturating_sub(1)];
                chat_prompt(history, &self.query)
            }
        };
        debug!(%prompt, "sending prompt");

        let answer = self.generator.generate(&prompt)?;
        let line = format!("{} {}: {answer}", self.turn, self.reply_label());
        self.say(output, line)?;
        self.turn += 1;
        self.state = SessionState::AwaitingInput;
        Ok(())
    }

    /// Closes the session after a failed turn, saving what was said so far.
    fn abort(&mut self, error: RagError) -> RagError {
        self.state = SessionState::Closed;
        if let Err(log_err) = self.write_log() {
            warn!(error = %log_err, "could not save chat history");
        }
        error
    }

    fn say<W: Write>(&mut self, output: &mut W, line: String) -> Result<()> {
        writeln!(output, "{line}")?;
        self.transcript.push(line);
        Ok(())
    }

    fn write_log(&self) -> Result<PathBuf> {
        let path = write_transcript(&self.log_dir, &self.transcript)?;
        info!(path = %path.display(), lines = self.transcript.len(), "chat history saved");
        Ok(path)
    }
}

/// Writes one line per entry to `chat-log-<timestamp>.txt` inside `log_dir`.
pub fn write_transcript(log_dir: &Path, transcript: &[String]) -> Result<PathBuf> {
    ensure_dir(log_dir)?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let mut suffix = 0;
    loop {
        let name = if suffix == 0 {
            format!("chat-log-{timestamp}.txt")
        } else {
            format!("chat-log-{timestamp}-{suffix}.txt")
        };
        let path = log_dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                for line in transcript {
                    writeln!(file, "{line}")?;
                }
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::tests::{ScriptedEmbedder, TopicEmbedder};
    use std::cell::RefCell;
    use std::fs;
    use std::io::Cursor;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Recorder {
        prompts: Rc<RefCell<Vec<String>>>,
    }

    impl TextGenerator for Recorder {
        fn generate(&self, prompt: &str) -> Result<String> {
            let mut prompts = self.prompts.borrow_mut();
            prompts.push(prompt.to_string());
            Ok(format!("answer {}", prompts.len()))
        }
    }

    struct Failing;

    impl TextGenerator for Failing {
        fn generate(&self, _prompt: &str) -> Result<String> {
            Err(RagError::Provider("503: unavailable".to_string()))
        }
    }

    fn built_retriever() -> Retriever {
        let mut retriever = Retriever::new(Box::new(TopicEmbedder), "geminidb");
        let docs: Vec<String> = ["A is safety", "B is speed", "C is cost"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        retriever.build(&docs).unwrap();
        retriever
    }

    fn log_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn test_rag_turn_uses_retrieved_passage() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let recorder = Recorder::default();
        let mut session = Session::rag(built_retriever(), "topics", Box::new(recorder.clone()), dir.path());

        let mut output = Vec::new();
        session.run(Cursor::new("what about safety?\n/q\n"), &mut output)?;

        let prompts = recorder.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("PASSAGE: 'A is safety'"));
        assert!(prompts[0].contains("QUESTION: 'what about safety?'"));

        let printed = String::from_utf8(output)?;
        assert!(printed.contains("1 RAG Chatbot: answer 1"));
        assert!(printed.contains("2 You: "));
        assert_eq!(session.state(), SessionState::Closed);
        Ok(())
    }

    #[test]
    fn test_blank_input_is_ignored() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let recorder = Recorder::default();
        let mut session = Session::rag(built_retriever(), "topics", Box::new(recorder.clone()), dir.path());

        session.run(Cursor::new("\n   \n\t\n/q\n"), Vec::new())?;

        assert!(recorder.prompts.borrow().is_empty());
        assert_eq!(session.turns_completed(), 0);
        assert_eq!(session.transcript().last().map(String::as_str), Some("1 You: /q"));
        Ok(())
    }

    #[test]
    fn test_sentinel_writes_single_log_with_transcript() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let log_dir = dir.path().join("log");
        let mut session = Session::rag(built_retriever(), "topics", Box::new(Recorder::default()), &log_dir);

        let path = session.run(Cursor::new("speed\n/Q\n"), Vec::new())?;

        assert_eq!(log_files(&log_dir), vec![path.clone()]);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("chat-log-") && name.ends_with(".txt"));

        let expected: String = session.transcript().iter().map(|l| format!("{l}\n")).collect();
        assert_eq!(fs::read_to_string(&path)?, expected);
        assert_eq!(session.transcript()[0], "Welcome to Gemini RAG Chatbot ! ('/q' to exit)");
        assert_eq!(session.transcript()[1], "Based on doc set of subject: 'topics'");
        assert_eq!(session.transcript()[2], "1 You: speed");
        assert!(session.transcript()[3].starts_with("1 Prompt: "));
        assert_eq!(session.transcript()[4], "1 RAG Chatbot: answer 1");
        assert_eq!(session.transcript()[5], "2 You: /Q");
        Ok(())
    }

    #[test]
    fn test_empty_index_reported_without_generation() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let recorder = Recorder::default();
        let retriever = Retriever::new(Box::new(TopicEmbedder), "geminidb");
        let mut session = Session::rag(retriever, "nothing", Box::new(recorder.clone()), dir.path());

        session.run(Cursor::new("safety\n/q\n"), Vec::new())?;

        assert!(recorder.prompts.borrow().is_empty());
        let transcript = session.transcript();
        assert!(transcript.iter().any(|l| l.starts_with("1 RAG Chatbot: collection 'geminidb'")));
        assert_eq!(transcript.last().map(String::as_str), Some("2 You: /q"));
        Ok(())
    }

    #[test]
    fn test_end_of_input_closes_session() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut session = Session::chat(Box::new(Recorder::default()), dir.path());

        session.run(Cursor::new("hello\n"), Vec::new())?;

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(log_files(dir.path()).len(), 1);
        Ok(())
    }

    #[test]
    fn test_chat_replays_history() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let recorder = Recorder::default();
        let mut session = Session::chat(Box::new(recorder.clone()), dir.path());

        session.run(Cursor::new("my name is Sam\nwhat is my name?\n/q\n"), Vec::new())?;

        let prompts = recorder.prompts.borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].ends_with("new prompt: my name is Sam"));
        assert!(prompts[1].contains("1 You: my name is Sam\n1 Chatbot: answer 1\n+++"));
        assert!(prompts[1].ends_with("new prompt: what is my name?"));
        assert!(!prompts[1].contains("2 You:"));
        Ok(())
    }

    #[test]
    fn test_provider_failure_saves_history_and_fails() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut session = Session::chat(Box::new(Failing), dir.path());

        let err = session.run(Cursor::new("hello\n"), Vec::new()).unwrap_err();

        assert!(matches!(err, RagError::Provider(_)));
        let files = log_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(fs::read_to_string(&files[0])?.contains("1 You: hello"));
        Ok(())
    }

    #[test]
    fn test_query_embedding_failure_saves_history_and_fails() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let embedder = ScriptedEmbedder::new(vec![
            Ok(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
            Err(RagError::Provider("503 UNAVAILABLE".to_string())),
        ]);
        let mut retriever = Retriever::new(Box::new(embedder), "geminidb");
        retriever.build(&["zero".to_string(), "one".to_string()])?;
        let recorder = Recorder::default();
        let mut session = Session::rag(retriever, "topics", Box::new(recorder.clone()), dir.path());

        let err = session.run(Cursor::new("hello\n"), Vec::new()).unwrap_err();

        assert!(matches!(err, RagError::Provider(_)));
        assert!(recorder.prompts.borrow().is_empty());
        assert_eq!(session.state(), SessionState::Closed);
        let files = log_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(fs::read_to_string(&files[0])?.contains("1 You: hello"));
        Ok(())
    }

    #[test]
    fn test_write_transcript_never_overwrites() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let first = write_transcript(dir.path(), &["one".to_string()])?;
        let second = write_transcript(dir.path(), &["two".to_string()])?;
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(first)?, "one\n");
        assert_eq!(fs::read_to_string(second)?, "two\n");
        Ok(())
    }
}
