mod image;
mod serve;

use std::path::Path;

use proxygen_build::DockerfileGenerator;
use proxygen_build::eject as eject_mod;
use proxygen_core::ImageConfig;

pub use image::{bundle, check, dockerfile, eject};
pub use serve::serve;

/// The ejected recipe when present, otherwise a freshly rendered one.
pub(crate) fn resolve_recipe(project_dir: &Path, image: &ImageConfig) -> anyhow::Result<String> {
    if eject_mod::is_ejected(project_dir) {
        tracing::info!("using ejected recipe from .proxygen/Dockerfile");
        return Ok(eject_mod::load_ejected_dockerfile(project_dir)?);
    }
    Ok(DockerfileGenerator::new(image).render())
}
