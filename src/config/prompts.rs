//! Prompt templates for smartmedia.

use std::collections::HashMap;

/// System prompt for the dispatch agent. The tool catalog is appended at runtime.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are a media processing assistant. You receive a file and an instruction from the user, and you have access to a set of media processing tools.

Guidelines:
- Every tool takes a single string input: a file path, or plain text for text tools
- Call one tool at a time and wait for its result before deciding the next step
- Pass the output of one tool as the input of the next when a task needs several steps (for example, transcribe and then summarize)
- If a tool fails, read the error and decide whether another tool or input can still satisfy the instruction
- When the instruction is satisfied, reply with the final answer. For file-producing tools, include the output path"#;

/// Prompt template for the summarizer tool.
pub const SUMMARIZE_PROMPT: &str = r#"Below is a text that needs to be summarized. Please provide a clear, concise summary that captures the main points and key information:

{{text}}

Create a summary that is both informative and easy to understand. Focus on the most important points while maintaining accuracy."#;

/// Render a prompt template with the given variables.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template() {
        let mut vars = HashMap::new();
        vars.insert("text", "The quick brown fox.");

        let result = render(SUMMARIZE_PROMPT, &vars);
        assert!(result.contains("The quick brown fox."));
        assert!(!result.contains("{{text}}"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let vars = HashMap::new();
        assert_eq!(render("Hello {{name}}", &vars), "Hello {{name}}");
    }
}
