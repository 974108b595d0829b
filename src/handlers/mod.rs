//! Model handlers. Each one turns a prompt and its context into response text;
//! there is no inference behind them, only templates.

pub mod codegen;
pub mod debugger;

use crate::errors::HandlerError;
use crate::models::Context;

pub const DEFAULT_LANGUAGE: &str = "python";

/// Everything a handler may look at. The prompt is already trimmed.
#[derive(Debug, Clone, Copy)]
pub struct HandlerInput<'a> {
    pub prompt: &'a str,
    pub context: &'a Context,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl<'a> HandlerInput<'a> {
    /// Optional string field of the context; any other JSON type is rejected.
    pub fn context_str(&self, field: &str) -> Result<Option<&'a str>, HandlerError> {
        match self.context.get(field) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(HandlerError::InvalidContext(field.to_string())),
        }
    }

    pub fn language(&self) -> Result<&'a str, HandlerError> {
        Ok(self.context_str("language")?.unwrap_or(DEFAULT_LANGUAGE))
    }
}

pub type HandlerFn = fn(&HandlerInput<'_>) -> Result<String, HandlerError>;

const DEBUG_KEYWORDS: [&str; 4] = ["debug", "fix", "error", "bug"];
const GENERATE_KEYWORDS: [&str; 3] = ["generate", "create", "write"];

/// General-purpose model: answers as debugger, code generator or plain advisor
/// depending on what the prompt asks for.
pub fn aiden_7b(input: &HandlerInput<'_>) -> Result<String, HandlerError> {
    let language = input.language()?;
    let prompt = input.prompt.to_lowercase();

    if DEBUG_KEYWORDS.iter().any(|k| prompt.contains(k)) {
        Ok(debugger::debugging_overview(input.prompt, language))
    } else if GENERATE_KEYWORDS.iter().any(|k| prompt.contains(k)) {
        Ok(codegen::simple_code(input.prompt, language))
    } else {
        Ok(general_response(input.prompt, language))
    }
}

fn general_response(prompt: &str, language: &str) -> String {
    format!(
        "# Response to: {prompt}\n\
         \n\
         This is a general response for your query about {language} programming.\n\
         \n\
         ## Key Points:\n\
         - Understanding the problem requirements\n\
         - Choosing the right approach and data structures\n\
         - Writing clean, readable code\n\
         - Testing and debugging thoroughly\n\
         \n\
         ## Next Steps:\n\
         1. Refine the requirements\n\
         2. Implement the solution\n\
         3. Test with various inputs\n\
         4. Optimize if needed\n"
    )
}
