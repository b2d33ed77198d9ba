//! One-shot generation tools: a model with a fixed persona answers once.

use crate::error::Result;
use crate::gemini::{GeminiClient, GenerativeModel, TextGenerator};
use crate::prompt::{
    CODE_INSTRUCTION, EXPERT_INSTRUCTION, STUDENT_INSTRUCTION, TEACHER_INSTRUCTION,
    TROUBLESHOOT_INSTRUCTION, troubleshoot_prompt,
};
use tracing::info;

pub const DEFAULT_CODE_TASK: &str = "write code to convert text format from DOS to Linux";
pub const DEFAULT_ESSAY_TOPIC: &str = "Benefits of reading";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    Expert,
    Coder,
    Troubleshooter,
    Student,
    Teacher,
}

impl Persona {
    pub fn instruction(self) -> &'static str {
        match self {
            Persona::Expert => EXPERT_INSTRUCTION,
            Persona::Coder => CODE_INSTRUCTION,
            Persona::Troubleshooter => TROUBLESHOOT_INSTRUCTION,
            Persona::Student => STUDENT_INSTRUCTION,
            Persona::Teacher => TEACHER_INSTRUCTION,
        }
    }

    /// Students get variety, everyone else is deterministic.
    pub fn temperature(self) -> f32 {
        match self {
            Persona::Student => 1.0,
            _ => 0.0,
        }
    }

    pub fn model(self, client: GeminiClient, model_name: &str) -> GenerativeModel {
        GenerativeModel::new(client, model_name)
            .with_temperature(self.temperature())
            .with_system_instruction(self.instruction())
    }
}

pub fn expert_answer(model: &dyn TextGenerator, user_input: &str) -> Result<String> {
    model.generate(user_input)
}

pub fn generate_code(model: &dyn TextGenerator, task: &str) -> Result<String> {
    model.generate(task)
}

pub fn troubleshoot(model: &dyn TextGenerator, error_message: &str) -> Result<String> {
    model.generate(&troubleshoot_prompt(error_message))
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub essay: String,
    pub evaluation: String,
}

/// The student writes a flawed essay on `topic`, the teacher grades and
/// rewrites it.
pub fn evaluate_essay(
    student: &dyn TextGenerator,
    teacher: &dyn TextGenerator,
    topic: &str,
) -> Result<Evaluation> {
    let essay = student.generate(topic)?;
    info!(topic, chars = essay.len(), "student essay written");
    let evaluation = teacher.generate(&essay)?;
    Ok(Evaluation { essay, evaluation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use std::cell::RefCell;

    struct Echo {
        tag: &'static str,
        seen: RefCell<Vec<String>>,
    }

    impl Echo {
        fn new(tag: &'static str) -> Self {
            Echo { tag, seen: RefCell::new(Vec::new()) }
        }
    }

    impl TextGenerator for Echo {
        fn generate(&self, prompt: &str) -> Result<String> {
            self.seen.borrow_mut().push(prompt.to_string());
            Ok(format!("{}({prompt})", self.tag))
        }
    }

    struct Down;

    impl TextGenerator for Down {
        fn generate(&self, _prompt: &str) -> Result<String> {
            Err(RagError::Provider("401 UNAUTHENTICATED".to_string()))
        }
    }

    #[test]
    fn test_persona_settings() {
        assert_eq!(Persona::Student.temperature(), 1.0);
        assert_eq!(Persona::Teacher.temperature(), 0.0);
        assert!(Persona::Coder.instruction().contains("default to Python"));
        assert!(Persona::Teacher.instruction().contains("scale of 1-5"));
    }

    #[test]
    fn test_troubleshoot_wraps_message() -> anyhow::Result<()> {
        let model = Echo::new("fix");
        troubleshoot(&model, "IndexError: list index out of range")?;
        let seen = model.seen.borrow();
        assert!(seen[0].starts_with("You've encountered the following error message:"));
        assert!(seen[0].contains("IndexError"));
        Ok(())
    }

    #[test]
    fn test_evaluation_feeds_essay_to_teacher() -> anyhow::Result<()> {
        let student = Echo::new("essay");
        let teacher = Echo::new("grade");
        let result = evaluate_essay(&student, &teacher, DEFAULT_ESSAY_TOPIC)?;

        assert_eq!(result.essay, "essay(Benefits of reading)");
        assert_eq!(result.evaluation, "grade(essay(Benefits of reading))");
        Ok(())
    }

    #[test]
    fn test_provider_errors_propagate() {
        let err = evaluate_essay(&Down, &Echo::new("grade"), "topic").unwrap_err();
        assert!(matches!(err, RagError::Provider(_)));
        assert!(matches!(generate_code(&Down, DEFAULT_CODE_TASK), Err(RagError::Provider(_))));
    }
}
