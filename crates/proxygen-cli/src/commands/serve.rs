use std::path::Path;

use proxygen::Settings;

pub async fn serve(project_dir: &Path) -> anyhow::Result<()> {
    let settings = Settings::load_in(project_dir)?;
    tracing::debug!(?settings, "starting service");
    proxygen::serve(settings).await?;
    Ok(())
}
