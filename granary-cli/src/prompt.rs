use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use granary_command::ChoicePrompter;

/// Numbered-menu prompter over stdin/stderr.
pub struct ConsolePrompter;

#[async_trait]
impl ChoicePrompter for ConsolePrompter {
    async fn choose(&self, prompt: &str, options: &[String]) -> Option<String> {
        if options.is_empty() {
            return None;
        }

        eprintln!("{prompt}:");
        for (idx, option) in options.iter().enumerate() {
            eprintln!("  {}) {option}", idx + 1);
        }
        eprint!("choice (empty to abort): ");

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        reader.read_line(&mut line).await.ok()?;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let index = trimmed.parse::<usize>().ok()?.checked_sub(1)?;
        options.get(index).cloned()
    }
}
