use serde_json::{json, Value};

use super::HandlerInput;
use crate::errors::{ApiError, HandlerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    General,
    CodeFix,
    Performance,
    Security,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::General => "general",
            AnalysisType::CodeFix => "code_fix",
            AnalysisType::Performance => "performance",
            AnalysisType::Security => "security",
        }
    }

    /// Instruction placed in front of the caller's prompt.
    pub fn instruction(&self) -> Option<&'static str> {
        match self {
            AnalysisType::General => None,
            AnalysisType::CodeFix => Some("Fix the following code and explain the issues:"),
            AnalysisType::Performance => {
                Some("Analyze the performance of this code and suggest optimizations:")
            }
            AnalysisType::Security => {
                Some("Analyze this code for security vulnerabilities and suggest fixes:")
            }
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "code_fix" | "fix" => AnalysisType::CodeFix,
            "performance" => AnalysisType::Performance,
            "security" => AnalysisType::Security,
            _ => AnalysisType::General,
        }
    }

    fn findings(&self) -> &'static str {
        match self {
            AnalysisType::General | AnalysisType::CodeFix => {
                "1. Variable Scope: Check if variables are defined in correct scope\n\
                 2. Type Mismatches: Verify data types in operations\n\
                 3. Null/None Handling: Add checks for null/undefined values\n\
                 4. Resource Management: Ensure proper cleanup of resources"
            }
            AnalysisType::Performance => {
                "1. Repeated Work: Hoist invariant computations out of loops\n\
                 2. Data Structures: Prefer hash lookups over linear scans\n\
                 3. Allocation: Reuse buffers in hot paths\n\
                 4. I/O: Batch small reads and writes"
            }
            AnalysisType::Security => {
                "1. Input Validation: Validate and bound all external input\n\
                 2. Injection: Use parameterized queries and escaped output\n\
                 3. Secrets: Keep credentials out of source and logs\n\
                 4. Transport: Require TLS for every external call"
            }
        }
    }
}

/// Handler of the `debugger` model.
pub fn analyze(input: &HandlerInput<'_>) -> Result<String, HandlerError> {
    let language = input.language()?;
    let code = input.context_str("code")?;
    let analysis = input
        .context_str("analysis_type")?
        .map(AnalysisType::parse)
        .unwrap_or(AnalysisType::General);

    Ok(format!(
        "# Debugging Analysis Report\n\
         # Language: {language}\n\
         # Analysis type: {kind}\n\
         # Analysis for: {prompt}\n\
         \n\
         ## Code Analysis:\n\
         {code}\n\
         \n\
         ## Findings:\n\
         {findings}\n\
         \n\
         ## Debugging Recommendations:\n\
         - Add debugging prints and logging\n\
         - Add error handling around fallible calls\n\
         - Include input validation\n\
         - Add unit tests for verification\n",
        kind = analysis.as_str(),
        prompt = input.prompt,
        code = code.unwrap_or("# No code snippet provided"),
        findings = analysis.findings(),
    ))
}

pub(crate) fn debugging_overview(prompt: &str, language: &str) -> String {
    format!(
        "# Debugging Analysis for {language}\n\
         \n\
         ## Issue Analysis:\n\
         {prompt}\n\
         \n\
         ## Potential Issues:\n\
         1. Syntax Error: Check for missing colons, parentheses, or indentation issues\n\
         2. Logic Error: Verify the algorithm logic and edge cases\n\
         3. Type Error: Ensure variable types match expected operations\n\
         4. Runtime Error: Check for division by zero, index out of bounds, etc.\n\
         \n\
         ## Debugging Steps:\n\
         1. Add print statements to trace variable values\n\
         2. Use a debugger to step through the code\n\
         3. Check input validation and error handling\n\
         4. Verify function return types and values\n"
    )
}

fn best_practice_catalog() -> Value {
    json!({
        "python": {
            "general": [
                "Use meaningful variable names",
                "Follow PEP 8 style guide",
                "Write docstrings for functions and classes",
                "Use list comprehensions when appropriate",
                "Handle exceptions properly"
            ],
            "performance": [
                "Use built-in functions and libraries",
                "Avoid unnecessary loops",
                "Use generators for large datasets",
                "Profile your code to identify bottlenecks"
            ],
            "security": [
                "Validate all input data",
                "Use parameterized queries for databases",
                "Don't store secrets in code",
                "Use HTTPS for all communications"
            ]
        },
        "javascript": {
            "general": [
                "Use strict mode",
                "Prefer const and let over var",
                "Use arrow functions appropriately",
                "Handle errors with try/catch",
                "Use meaningful function names"
            ]
        }
    })
}

fn common_issue_catalog() -> Value {
    json!({
        "python": {
            "syntax_errors": {
                "missing_colon": {
                    "description": "Missing colon in if/for/while/def statements",
                    "example": "if x > 0  # Missing colon",
                    "fix": "if x > 0:"
                },
                "indentation": {
                    "description": "Incorrect indentation",
                    "example": "Mixing tabs and spaces",
                    "fix": "Use consistent indentation (4 spaces recommended)"
                }
            },
            "runtime_errors": {
                "index_error": {
                    "description": "List index out of range",
                    "prevention": "Check list length before accessing indices"
                },
                "key_error": {
                    "description": "Dictionary key doesn't exist",
                    "prevention": "Use .get() method or check key existence"
                }
            },
            "logic_errors": {
                "off_by_one": {
                    "description": "Loop or array access off by one",
                    "prevention": "Carefully check loop bounds and array indices"
                }
            }
        },
        "javascript": {
            "common_errors": {
                "undefined_variables": {
                    "description": "Using undefined variables",
                    "prevention": "Always declare variables with let/const"
                },
                "async_issues": {
                    "description": "Not handling async operations properly",
                    "prevention": "Use async/await or proper promise handling"
                }
            }
        }
    })
}

pub fn best_practices(language: &str, category: &str) -> Result<Value, ApiError> {
    let catalog = best_practice_catalog();
    let by_language = catalog
        .get(language)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Best practices not available for language: {}",
                language
            ))
        })?;

    let available: Vec<&String> = by_language.keys().collect();
    let practices = by_language.get(category).ok_or_else(|| {
        ApiError::NotFound(format!(
            "Category '{}' not found. Available: {:?}",
            category, available
        ))
    })?;

    Ok(json!({
        "language": language,
        "category": category,
        "practices": practices,
        "metadata": {
            "total_practices": practices.as_array().map(|a| a.len()).unwrap_or(0),
            "available_categories": available,
        }
    }))
}

pub fn common_issues(language: &str) -> Result<Value, ApiError> {
    let catalog = common_issue_catalog();
    let available: Vec<&String> = catalog
        .as_object()
        .map(|o| o.keys().collect())
        .unwrap_or_default();

    let issues = catalog.get(language).ok_or_else(|| {
        ApiError::NotFound(format!(
            "Language '{}' not supported. Available: {:?}",
            language, available
        ))
    })?;

    Ok(json!({
        "language": language,
        "common_issues": issues,
        "metadata": {
            "total_categories": issues.as_object().map(|o| o.len()).unwrap_or(0),
            "available_languages": available,
        }
    }))
}
