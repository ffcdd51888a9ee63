//! Instruction templates sent ahead of decompiled or user-supplied code.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Template used by `/decompile`: a function relationship map followed by the
/// code with inline comments, without changing the code.
pub const DOCUMENTATION_PROMPT: &str = "Generate a **function relationship map** for the given code with: \n 1. Function Name \n2. Variables: List with brief roles. \n 3. Return Value: What it returns and why. \n 4. Relationships:  Variable/function interactions (e.g., calls, return usage). \n **Rules**: No code modifications. \n then give some space in the bottom and in the next follow this by adding  inline comments or documentation for the following code. The comments should describe the purpose of each block of code or important lines. Do not modify the original structure or indentation of the code in any way. The goal is to improve understanding without altering the actual code.Please focus only on the code without any commentary ";

pub const RECODE_PROMPT: &str = "Reconstruct the following code while maintaining its original logic. The goal is to improve its readability, structure, and clarity, as though it were written from scratch in a cleaner and more modern style. Do not alter the core logic of the code, only refactor the way it is written without commentary.";

/// Translation template for `lang`.
pub fn translate_prompt(lang: &str) -> String {
    format!(
        "Translate the following code into {lang}. Ensure that the logic remains exactly the same and that the translated code adheres to the syntax and conventions of the target language."
    )
}

/// `template`, a newline, then `body`.
pub fn compose(template: &str, body: &str) -> String {
    let mut prompt = String::with_capacity(template.len() + 1 + body.len());
    prompt.push_str(template);
    prompt.push('\n');
    prompt.push_str(body);
    prompt
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("Missing required fields: pseudo_code or method")]
    MissingFields,
    #[error("Missing required field: lang for translation method")]
    MissingLang,
    #[error("Invalid method")]
    InvalidMethod(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateMethod {
    Recode,
    Translate { lang: String },
}

impl TranslateMethod {
    pub fn template(&self) -> String {
        match self {
            TranslateMethod::Recode => RECODE_PROMPT.to_string(),
            TranslateMethod::Translate { lang } => translate_prompt(lang),
        }
    }
}

/// JSON envelope accepted by `/translate`. Absent and `null` fields read as
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateRequest {
    #[serde(deserialize_with = "null_as_empty")]
    pub pseudo_code: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub method: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub lang: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl TranslateRequest {
    /// Validate the envelope and pick the template.
    pub fn method(&self) -> Result<TranslateMethod, PromptError> {
        if self.pseudo_code.is_empty() || self.method.is_empty() {
            return Err(PromptError::MissingFields);
        }
        match self.method.as_str() {
            "recode" => Ok(TranslateMethod::Recode),
            "translate" if self.lang.is_empty() => Err(PromptError::MissingLang),
            "translate" => Ok(TranslateMethod::Translate { lang: self.lang.clone() }),
            other => Err(PromptError::InvalidMethod(other.to_string())),
        }
    }

    pub fn into_prompt(self) -> Result<String, PromptError> {
        let method = self.method()?;
        Ok(compose(&method.template(), &self.pseudo_code))
    }
}

/// Prompt for annotating decompiled C.
pub fn documentation_prompt(decompiled: &str) -> String {
    compose(DOCUMENTATION_PROMPT, decompiled)
}
