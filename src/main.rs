use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use principled_baker::{
    bake::{Baker, FileImageStore, FlatRasterizer, check_preconditions},
    config::BakeConfig,
    dsl, planner,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "principled-baker", version, about)]
struct Cli {
    /// Scene JSON to bake.
    #[arg(long)]
    scene: PathBuf,
    /// Bake settings JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to write the scene after baking. Defaults to overwriting --scene.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Detect the quantities to bake instead of using the configured set.
    #[arg(long)]
    autodetect: bool,
    /// Print the bake plan and exit.
    #[arg(long)]
    dry_run: bool,
}

fn scene_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn print_plan(scene: &principled_baker::Scene, config: &BakeConfig) -> Result<()> {
    let (_, sources) = check_preconditions(scene, config)?;
    for object in sources {
        let plan = planner::plan(scene, object, config, &HashSet::new())?;
        let name = &scene.object(object)?.name;
        let baked: Vec<&str> = plan.quantities.iter().map(|q| q.name()).collect();
        println!("{name}: bake [{}]", baked.join(", "));
        for (q, v) in &plan.constants {
            println!("{name}: constant {q} = {v:?}");
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => BakeConfig::load(path)?,
        None => BakeConfig::default(),
    };
    if cli.autodetect {
        config.autodetect = true;
    }

    let doc = dsl::load_scene_from_path(&cli.scene)?;
    let mut scene = doc
        .into_scene()
        .with_context(|| format!("invalid scene {}", cli.scene.display()))?;

    if cli.dry_run {
        return print_plan(&scene, &config);
    }

    let mut store = FileImageStore::new(scene_dir(&cli.scene));
    let mut rasterizer = FlatRasterizer;
    let report = Baker::new(&config, &mut store, &mut rasterizer).run(&mut scene)?;

    let out = cli.output.unwrap_or(cli.scene);
    dsl::save_scene_to_path(&scene.to_dsl(doc.metadata)?, &out)?;
    tracing::info!(
        baked = report.baked.len(),
        skipped = report.skipped.len(),
        constants = report.constants.len(),
        warnings = report.warnings().count(),
        "bake finished, scene written to {}",
        out.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    run(Cli::parse())
}
