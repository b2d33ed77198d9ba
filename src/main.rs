mod config;
mod embedder;
mod error;
mod gemini;
mod prompt;
mod retriever;
mod session;
mod tools;
mod utils;
mod vector_db;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use config::SessionConfig;
use embedder::{Embedder, HashingEmbedder};
use gemini::{GeminiClient, GeminiEmbedder, GenerativeModel};
use retriever::Retriever;
use session::Session;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tools::Persona;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DOCUMENT1: &str = "Gemini is the result of large-scale collaborative efforts by teams across Google, including our colleagues at Google Research. It was built from the ground up to be multimodal, which means it can generalize and seamlessly understand, operate across and combine different types of information including text, code, audio, image and video.";
const DOCUMENT2: &str = "We designed Gemini to be natively multimodal, pre-trained from the start on different modalities. Then we fine-tuned it with additional multimodal data to further refine its effectiveness. This helps Gemini seamlessly understand and reason about all kinds of inputs from the ground up, far better than existing multimodal models — and its capabilities are state of the art in nearly every domain.";
const DOCUMENT3: &str = "Gemini has the most comprehensive safety evaluations of any Google AI model to date, including for bias and toxicity. We’ve conducted novel research into potential risk areas like cyber-offense, persuasion and autonomy, and have applied Google Research’s best-in-class adversarial testing techniques to help identify critical safety issues in advance of Gemini’s deployment.";

const SAMPLE_ERROR: &str = "   1 my_list = [1,2,3]\n----> 2 print(my_list[3])\n\nIndexError: list index out of range";

#[derive(Parser)]
#[command(name = "gemini-rag-chat", about = "Chat and RAG demos on the Gemini API")]
struct Cli {
    /// Directory holding the env file (`~` is the home directory)
    #[arg(long, global = true, default_value = "~")]
    env_path: String,

    /// Env file containing GOOGLE_API_KEY
    #[arg(long, global = true, default_value = ".env")]
    env_file: String,

    /// Generative model name
    #[arg(long, global = true, default_value = "gemini-1.5-flash")]
    model: String,

    /// Base URL of the generative-language API
    #[arg(long, global = true, default_value = gemini::DEFAULT_BASE_URL)]
    base_url: String,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Retrieval-augmented chat over a small document set
    Rag {
        #[arg(long, default_value = "geminidb")]
        collection: String,
        #[arg(long, default_value = "Gemini intro")]
        subject: String,
        #[arg(long, default_value = "./log")]
        log_dir: PathBuf,
        /// Index the .txt files in this directory instead of the built-in passages
        #[arg(long)]
        docs: Option<PathBuf>,
        /// Embed locally instead of calling the embedding API
        #[arg(long)]
        local_embeddings: bool,
    },
    /// General chat that replays the conversation as context
    Chat {
        #[arg(long, default_value = "./log")]
        log_dir: PathBuf,
    },
    /// Ask a domain expert a single question
    Expert { query: Option<String> },
    /// Generate a code snippet for a task
    Code { task: Option<String> },
    /// Explain an error message and how to fix it
    Troubleshoot { message: Option<String> },
    /// Have a student write an essay and a teacher grade it
    Evaluate { topic: Option<String> },
    /// List models that support text generation
    Models,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("gemini_rag_chat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn run_rag(
    config: &SessionConfig,
    client: GeminiClient,
    subject: String,
    log_dir: PathBuf,
    docs: Option<PathBuf>,
    local_embeddings: bool,
) -> Result<()> {
    let documents = match docs {
        Some(dir) => utils::load_text_files(&dir)
            .with_context(|| format!("loading documents from {}", dir.display()))?,
        None => vec![DOCUMENT1.to_string(), DOCUMENT2.to_string(), DOCUMENT3.to_string()],
    };

    let embedder: Box<dyn Embedder> = if local_embeddings {
        Box::new(HashingEmbedder::default())
    } else {
        Box::new(GeminiEmbedder::new(client.clone()))
    };

    let mut retriever = Retriever::new(embedder, config.collection_name.as_str());
    retriever
        .build(&documents)
        .with_context(|| format!("building collection '{}'", config.collection_name))?;

    if retriever.is_empty() {
        warn!(collection = %config.collection_name, "no documents indexed, every question will report an empty index");
    }
    info!(entries = retriever.len(), "index ready");

    let model = GenerativeModel::new(client, config.model_name.as_str());
    let mut session = Session::rag(retriever, subject, Box::new(model), log_dir);
    session.run(io::stdin().lock(), io::stdout().lock())?;
    info!(turns = session.turns_completed(), "session closed");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = SessionConfig {
        env_path: cli.env_path,
        env_file: cli.env_file,
        model_name: cli.model,
        ..SessionConfig::default()
    };
    if let Command::Rag { collection, .. } = &cli.command {
        config.collection_name = collection.clone();
    }

    let api_key = config.api_key().context("loading API key")?;
    let client = GeminiClient::new(api_key)?.with_base_url(cli.base_url);
    info!(model = %config.model_name, "client ready");

    match cli.command {
        Command::Rag {
            subject,
            log_dir,
            docs,
            local_embeddings,
            ..
        } => run_rag(&config, client, subject, log_dir, docs, local_embeddings)?,
        Command::Chat { log_dir } => {
            let model = GenerativeModel::new(client, config.model_name.as_str());
            let mut session = Session::chat(Box::new(model), log_dir);
            session.run(io::stdin().lock(), io::stdout().lock())?;
            info!(turns = session.turns_completed(), "session closed");
        }
        Command::Expert { query } => {
            let query = match query {
                Some(query) => query,
                None => read_line("Enter your query for the expert: ")?,
            };
            if query.is_empty() {
                bail!("query cannot be empty");
            }
            let model = Persona::Expert.model(client, &config.model_name);
            let answer = tools::expert_answer(&model, &query)?;
            println!("Expert's Answer:");
            println!("{answer}");
        }
        Command::Code { task } => {
            let task = task.unwrap_or_else(|| tools::DEFAULT_CODE_TASK.to_string());
            let model = Persona::Coder.model(client, &config.model_name);
            println!("{}", tools::generate_code(&model, &task)?);
        }
        Command::Troubleshoot { message } => {
            let message = message.unwrap_or_else(|| SAMPLE_ERROR.to_string());
            let model = Persona::Troubleshooter.model(client, &config.model_name);
            println!("{}", tools::troubleshoot(&model, &message)?);
        }
        Command::Evaluate { topic } => {
            let topic = topic.unwrap_or_else(|| tools::DEFAULT_ESSAY_TOPIC.to_string());
            let student = Persona::Student.model(client.clone(), &config.model_name);
            let teacher = Persona::Teacher.model(client, &config.model_name);
            let result = tools::evaluate_essay(&student, &teacher, &topic)?;
            println!("Student Essay:\n");
            println!("{}", result.essay);
            println!("\nTeacher Evaluation and Revised Essay:\n");
            println!("{}", result.evaluation);
        }
        Command::Models => {
            for name in client.list_models()? {
                println!("{name}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["gemini-rag-chat", "rag"]);
        assert_eq!(cli.env_path, "~");
        assert_eq!(cli.env_file, ".env");
        assert_eq!(cli.model, "gemini-1.5-flash");
        assert_eq!(cli.base_url, gemini::DEFAULT_BASE_URL);
        match cli.command {
            Command::Rag { collection, subject, log_dir, docs, local_embeddings } => {
                assert_eq!(collection, "geminidb");
                assert_eq!(subject, "Gemini intro");
                assert_eq!(log_dir, PathBuf::from("./log"));
                assert!(docs.is_none());
                assert!(!local_embeddings);
            }
            _ => panic!("expected rag command"),
        }
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::parse_from(["gemini-rag-chat", "chat", "--env-path", "/etc/keys", "--model", "gemini-pro"]);
        assert_eq!(cli.env_path, "/etc/keys");
        assert_eq!(cli.model, "gemini-pro");
        assert!(matches!(cli.command, Command::Chat { .. }));
    }

    #[test]
    fn test_built_in_corpus_answers_safety() -> Result<()> {
        let documents = vec![DOCUMENT1.to_string(), DOCUMENT2.to_string(), DOCUMENT3.to_string()];
        let mut retriever = Retriever::new(Box::new(HashingEmbedder::default()), "geminidb");
        retriever.build(&documents)?;
        assert_eq!(retriever.retrieve("safety evaluations")?, DOCUMENT3);
        Ok(())
    }
}
