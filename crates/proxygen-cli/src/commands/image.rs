use std::path::Path;

use proxygen_build::context;
use proxygen_build::eject as eject_mod;
use proxygen_build::{DependencyLayer, DockerfileGenerator};
use proxygen_core::ProxygenConfig;

use super::resolve_recipe;

pub async fn dockerfile(project_dir: &Path) -> anyhow::Result<()> {
    let config = ProxygenConfig::load(project_dir)?;
    print!("{}", resolve_recipe(project_dir, &config.image)?);
    Ok(())
}

pub async fn check(project_dir: &Path) -> anyhow::Result<()> {
    let config = ProxygenConfig::load(project_dir)?;
    let layer = DependencyLayer::load(project_dir, &config.image)?;

    println!(
        "{} and {} are consistent",
        config.image.manifest, config.image.lockfile
    );
    for package in layer.third_party() {
        println!("  {} {}", package.name, package.version);
    }
    println!("cache key: {}", layer.cache_key());
    Ok(())
}

pub async fn bundle(project_dir: &Path) -> anyhow::Result<()> {
    let config = ProxygenConfig::load(project_dir)?;

    println!("Validating dependency inputs...");
    let layer = DependencyLayer::load(project_dir, &config.image)?;

    let recipe = resolve_recipe(project_dir, &config.image)?;

    println!("Assembling build context...");
    let context_dir = context::assemble(project_dir, &config.image, &recipe)?;

    println!(
        "Build context ready at {} ({} locked packages, cache key {})",
        context_dir.display(),
        layer.third_party().count(),
        layer.cache_key()
    );
    println!("Build it with: docker build {}", context_dir.display());
    Ok(())
}

pub async fn eject(project_dir: &Path) -> anyhow::Result<()> {
    let config = ProxygenConfig::load(project_dir)?;
    let recipe = DockerfileGenerator::new(&config.image).render();

    eject_mod::eject(project_dir, &recipe)?;

    println!("Ejected recipe to .proxygen/Dockerfile");
    println!("You can now edit it directly. proxygen bundle will use this file.");
    Ok(())
}
