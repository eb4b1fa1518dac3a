//! System prompt construction.

use chrono::{DateTime, SecondsFormat, Utc};

const ROOT_DIRECTORY_PLACEHOLDER: &str = "[ROOT_DIRECTORY]";
const SYSTEM_TIME_PLACEHOLDER: &str = "[SYSTEM_TIME]";

/// Default system prompt template.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a careful assistant that answers questions about the files in a local project.

Project root directory: [ROOT_DIRECTORY]
Current system time: [SYSTEM_TIME]

Guidelines:
- Use the bash tool to inspect files before answering questions about them.
- The bash tool only supports read-only commands (ls, tree, rg, grep, cat, head, tail, sed, awk) and no shell operators.
- Run commands from the project root directory unless the user asks otherwise.
- Be concise and cite file paths when you refer to code.";

/// Builds the system message of an agent's conversation log.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    template: String,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            template: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_template(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template for `work_dir` at the current time.
    pub fn build_system_prompt(&self, work_dir: &str) -> String {
        self.build_system_prompt_at(work_dir, Utc::now())
    }

    pub fn build_system_prompt_at(&self, work_dir: &str, now: DateTime<Utc>) -> String {
        self.template
            .replace(ROOT_DIRECTORY_PLACEHOLDER, work_dir)
            .replace(
                SYSTEM_TIME_PLACEHOLDER,
                &now.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_placeholders_replaced() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let prompt = ContextBuilder::new().build_system_prompt_at("/work/project", now);

        assert!(prompt.contains("Project root directory: /work/project"));
        assert!(prompt.contains("Current system time: 2026-01-02T03:04:05Z"));
        assert!(!prompt.contains("[ROOT_DIRECTORY]"));
        assert!(!prompt.contains("[SYSTEM_TIME]"));
    }

    #[test]
    fn test_custom_template() {
        let builder = ContextBuilder::with_template("root=[ROOT_DIRECTORY] twice=[ROOT_DIRECTORY]");
        assert_eq!(builder.build_system_prompt("/a"), "root=/a twice=/a");
    }
}
