use serde_json::{json, Value};

use super::HandlerInput;
use crate::errors::{ApiError, HandlerError};

const FIBONACCI_PY: &str = r#"def fibonacci(n):
    """Generate fibonacci sequence up to n terms."""
    if n <= 0:
        return []
    elif n == 1:
        return [0]
    elif n == 2:
        return [0, 1]

    sequence = [0, 1]
    for i in range(2, n):
        sequence.append(sequence[i-1] + sequence[i-2])

    return sequence

# Example usage:
print(fibonacci(10))  # [0, 1, 1, 2, 3, 5, 8, 13, 21, 34]"#;

const FACTORIAL_PY: &str = r#"def factorial(n):
    """Calculate factorial of n using recursion."""
    if n < 0:
        raise ValueError("Factorial is not defined for negative numbers")
    elif n == 0 or n == 1:
        return 1
    else:
        return n * factorial(n - 1)

# Example usage:
print(factorial(5))  # 120"#;

/// Handler of the `codegen` model.
pub fn generate(input: &HandlerInput<'_>) -> Result<String, HandlerError> {
    let language = input.language()?;
    Ok(advanced_code(input.prompt, language))
}

pub(crate) fn simple_code(prompt: &str, language: &str) -> String {
    let lowered = prompt.to_lowercase();
    let python = language.eq_ignore_ascii_case("python");

    if python && lowered.contains("fibonacci") {
        FIBONACCI_PY.to_string()
    } else if python && lowered.contains("factorial") {
        FACTORIAL_PY.to_string()
    } else {
        format!(
            "# Generated {language} code for: {prompt}\n\
             \n\
             def main():\n    \"\"\"Main function implementation.\"\"\"\n    \
             print(\"Generated code based on prompt\")\n    pass\n\
             \n\
             if __name__ == \"__main__\":\n    main()\n"
        )
    }
}

fn advanced_code(prompt: &str, language: &str) -> String {
    format!(
        r#"# Advanced {language} Code Generation
# Optimized for production use

"""
Generated code for: {prompt}
This implementation includes error handling, type hints, and best practices.
"""

import asyncio
from typing import Dict
import logging

logger = logging.getLogger(__name__)

class AdvancedSolution:
    """Production-ready implementation."""

    def __init__(self):
        self.initialized = True

    async def process(self, data: Dict) -> Dict:
        if not self.initialized:
            raise RuntimeError("Solution not initialized")
        try:
            result = {{"processed": True, "input": data}}
            logger.info("Processing completed")
            return result
        except Exception as e:
            logger.error(f"Processing failed: {{e}}")
            raise

async def main():
    solution = AdvancedSolution()
    print(await solution.process({{"key": "value"}}))

if __name__ == "__main__":
    asyncio.run(main())
"#
    )
}

fn template_catalog() -> Value {
    json!({
        "python": {
            "api": {
                "name": "FastAPI Basic Template",
                "description": "Basic FastAPI application structure"
            },
            "algorithm": {
                "name": "Algorithm Templates",
                "description": "Common algorithm implementations"
            }
        },
        "javascript": {
            "api": {
                "name": "Express.js Template",
                "description": "Basic Express.js server template"
            }
        },
        "rust": {
            "api": {
                "name": "Axum Service Template",
                "description": "Basic axum server with shared state"
            },
            "cli": {
                "name": "Clap CLI Template",
                "description": "Command line tool with derive-based argument parsing"
            }
        }
    })
}

pub fn templates(language: &str, category: &str) -> Result<Value, ApiError> {
    let catalog = template_catalog();
    let by_language = catalog
        .get(language)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ApiError::NotFound(format!("Templates not available for language: {}", language))
        })?;

    let available: Vec<&String> = by_language.keys().collect();
    let template = by_language.get(category).ok_or_else(|| {
        ApiError::NotFound(format!(
            "Category '{}' not found. Available: {:?}",
            category, available
        ))
    })?;

    Ok(json!({
        "language": language,
        "category": category,
        "templates": template,
        "metadata": {
            "total_templates": template.as_object().map(|o| o.len()).unwrap_or(0),
            "available_categories": available,
        }
    }))
}
