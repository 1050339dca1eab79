//! Prompt templates for the two query modes.

const INITIAL_ANALYSIS_TEMPLATE: &str = r#"
You are a senior software architect reviewing a new GitHub repository. Based on the provided file structure and the content of the README file, deliver a concise, high-level analysis.

Your analysis should cover:
1.  **Project Purpose:** What is the most likely purpose of this project? What problem does it solve?
2.  **Technology Stack:** Based on file extensions and the README, what are the main languages, frameworks, and key libraries used?
3.  **Key Files/Folders:** Point out 3-5 important files or directories and hypothesize their role in the application.
4.  **Execution Instructions:** Based on the README, how would a developer typically run this project?

Here is the file structure:
{file_structure}

Here is the content of the README file:
{readme_content}

"#;

const QUESTION_TEMPLATE: &str = r#"
You are an expert software engineer acting as a "code buddy" for a colleague. Your goal is to answer their questions about a codebase using the provided context. Be clear, concise, and helpful. If the context doesn't contain the answer, state that the information is not available in the provided code snippets.

Context from the codebase:
---
{context}
---

Question:
{question}
"#;

/// Inputs of the initial architectural summary.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialAnalysisPrompt {
    pub file_structure: String,
    pub readme_content: String,
}

impl InitialAnalysisPrompt {
    pub fn render(&self) -> String {
        fill(
            INITIAL_ANALYSIS_TEMPLATE,
            &[
                ("file_structure", &self.file_structure),
                ("readme_content", &self.readme_content),
            ],
        )
    }
}

/// Inputs of one retrieval-augmented question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPrompt {
    pub context: String,
    pub question: String,
}

impl QuestionPrompt {
    pub fn render(&self) -> String {
        fill(
            QUESTION_TEMPLATE,
            &[("context", &self.context), ("question", &self.question)],
        )
    }
}

// Single pass, so placeholder-looking text inside a value is left alone.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });
        match substituted {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
