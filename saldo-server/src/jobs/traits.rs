use async_trait::async_trait;

use super::error::JobError;

#[async_trait]
pub trait ScheduledJob: Send + 'static {
    fn name(&self) -> &'static str;

    async fn run(&mut self) -> Result<(), JobError>;
}
