use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::ListenerError;

/// Hooks run around a command body.
///
/// Listeners run in registration order. A `pre_execution` failure prevents
/// the command body from running at all; a `post_execution` failure is
/// reported but the body's side effects stand.
#[async_trait]
pub trait CommandListener: Send + Sync {
    fn name(&self) -> &str;

    async fn pre_execution(&self, ctx: &ExecutionContext) -> Result<(), ListenerError>;

    async fn post_execution(&self, _ctx: &ExecutionContext) -> Result<(), ListenerError> {
        Ok(())
    }
}
