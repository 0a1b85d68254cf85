use async_trait::async_trait;

/// Capability for interactive selection when an operation cannot decide on
/// its own (unknown working branch, target missing from the farm catalog).
///
/// Headless environments inject an implementation that declines; the
/// operation then fails cleanly instead of blocking on input.
#[async_trait]
pub trait ChoicePrompter: Send + Sync {
    /// Present `options` and return the picked one, or `None` when the user
    /// declined or no interaction is possible.
    async fn choose(&self, prompt: &str, options: &[String]) -> Option<String>;
}

/// Prompter for non-interactive use: declines every choice.
pub struct HeadlessPrompter;

#[async_trait]
impl ChoicePrompter for HeadlessPrompter {
    async fn choose(&self, prompt: &str, _options: &[String]) -> Option<String> {
        tracing::warn!(prompt, "interactive choice requested in headless mode");
        None
    }
}
