use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref QUOTES: Regex = Regex::new(r#"['"]"#).expect("static regex");
    static ref NEWLINES: Regex = Regex::new(r"\r\n|\r|\n").expect("static regex");
}

const RAG_INSTRUCTIONS: &str = "You are a helpful and informative bot that answers questions \
using text from the reference passage included below. Be sure to respond in a complete sentence, \
being comprehensive, including all relevant background information. However, you are talking to \
a non-technical audience, so be sure to break down complicated concepts and strike a friendly and \
conversational tone. If the passage is irrelevant to the answer, you may ignore it.";

const CHAT_INSTRUCTIONS: &str = "Please go through chat history below if user ask question \
regarding on previous conversation.\nPlease answer question directly if it is not related to \
previous conversation";

pub const EXPERT_INSTRUCTION: &str = "You are an expert in a specific field. Your task is to \
provide precise, detailed, and well-informed answers based on the user input.";

pub const CODE_INSTRUCTION: &str = "You are a coding assistant. Your task is to generate a code \
snippet that accomplishes a specific goal.\nThe code snippet must be concise, efficient, and \
well-commented for clarity.\nConsider any constraints or requirements provided for the task.\n\n\
If the task does not specify a programming language, default to Python.";

pub const TROUBLESHOOT_INSTRUCTION: &str =
    "Your task is to explain exactly why this error occurred and how to fix it.";

pub const STUDENT_INSTRUCTION: &str = "You're a college student. Your job is to write an essay \
riddled with common mistakes and a few major ones.\nThe essay should have mistakes regarding \
clarity, grammar, argumentation, and vocabulary.\nEnsure your essay includes a clear thesis \
statement. You should write only an essay, so do not include any notes.";

pub const TEACHER_INSTRUCTION: &str = "As a teacher, you are tasked with grading students' \
essays.\nPlease follow these instructions for evaluation:\n\n\
1. Evaluate the essay on a scale of 1-5 based on the following criteria:\n\
- Thesis statement,\n\
- Clarity and precision of language,\n\
- Grammar and punctuation,\n\
- Argumentation\n\n\
2. Write a corrected version of the essay, addressing any identified issues\n\
in the original submission. Point what changes were made.";

/// Drops quote characters and flattens line breaks to single spaces.
pub fn escape_passage(passage: &str) -> String {
    let without_quotes = QUOTES.replace_all(passage, "");
    NEWLINES.replace_all(&without_quotes, " ").into_owned()
}

pub fn rag_prompt(query: &str, passage: &str) -> String {
    format!(
        "{RAG_INSTRUCTIONS}\nQUESTION: '{query}'\nPASSAGE: '{}'\n\nANSWER:\n",
        escape_passage(passage)
    )
}

/// Prior transcript lines as conversational context ahead of the new message.
pub fn chat_prompt(history: &[String], message: &str) -> String {
    let mut prompt = String::from(CHAT_INSTRUCTIONS);
    prompt.push_str("\n+++chat history\n");
    for line in history {
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt.push_str("+++\nnew prompt: ");
    prompt.push_str(message);
    prompt
}

pub fn troubleshoot_prompt(error_message: &str) -> String {
    format!("You've encountered the following error message:\nError Message: {error_message}")
}
