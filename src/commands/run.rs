use anyhow::Result;

use super::RunContext;

/// Download every calendar, then merge whatever arrived.
pub async fn run(ctx: &RunContext) -> Result<()> {
    super::download::run(ctx).await?;
    super::merge::run(ctx)
}
