//! scenec - Void Engine scene asset compiler
//!
//! Run with: cargo run -p void_scene_cli -- build assets/levels/*.json
//!       or: scenec dump compiled/forest.scene

mod args;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use void_scene_compiler::{
    compile_batch, AssetCatalog, CacheError, CacheManager, CatalogError, CompilerConfig, ConfigError,
    SceneAssetCompiler, SceneItemType,
};
use void_scene_format::{load_scene_file, DecodedPayload, FormatError, SceneData};

use crate::args::{BuildArgs, Cli, Commands};

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "scenec.toml";

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("{failed} of {total} scene assets failed to compile")]
    BuildFailed { failed: usize, total: usize },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Build(build) => run_build(build),
        Commands::Dump { artifact } => run_dump(&artifact),
    }
}

fn load_config(build: &BuildArgs) -> Result<CompilerConfig, CliError> {
    let mut config = match &build.config {
        Some(path) => CompilerConfig::load_from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => CompilerConfig::load_from_file(DEFAULT_CONFIG)?,
        None => CompilerConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(target) = &build.target {
        config.rhi_target = target.clone();
    }
    if let Some(jobs) = build.jobs {
        config.jobs = jobs;
    }
    config.force |= build.force;
    Ok(config)
}

fn run_build(build: BuildArgs) -> Result<(), CliError> {
    let config = load_config(&build)?;
    log::info!(
        "Target {}, output {}, {} input(s)",
        config.rhi_target,
        config.output_directory.display(),
        build.inputs.len()
    );

    let catalog = match &config.asset_catalog {
        Some(path) => AssetCatalog::load(path)?,
        None => {
            log::warn!("No asset catalog configured, only empty references will resolve");
            AssetCatalog::new()
        }
    };
    let cache = match &config.cache_database {
        Some(path) => CacheManager::open(path)?,
        None => CacheManager::in_memory(),
    };

    let jobs = config.effective_jobs();
    let compiler = SceneAssetCompiler::new(config, catalog);
    let results = compile_batch(&compiler, &build.inputs, &cache, jobs);

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        return Err(CliError::BuildFailed {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

fn run_dump(path: &Path) -> Result<(), CliError> {
    let scene = load_scene_file(path)?;
    print!("{}", describe(&scene));
    Ok(())
}

fn describe(scene: &SceneData) -> String {
    let mut out = format!("{} node(s), {} item(s)\n", scene.nodes.len(), scene.item_count());
    for (index, node) in scene.nodes.iter().enumerate() {
        let t = &node.transform;
        out += &format!(
            "node {}: position {:?} rotation {:?} scale {:?}\n",
            index, t.position, t.rotation, t.scale
        );
        for item in &node.items {
            let name = SceneItemType::by_type_id(item.type_id).map_or("<unknown>", |t| t.name);
            out += &format!("  {} ({}): {}\n", name, item.type_id, payload_summary(&item.payload));
        }
    }
    out
}

fn payload_summary(payload: &DecodedPayload) -> String {
    match payload {
        DecodedPayload::Camera => String::new(),
        DecodedPayload::Light(light) => format!("{:?}", light),
        DecodedPayload::Sunlight(sun) => format!("{:?}", sun),
        DecodedPayload::Mesh(mesh) => format!(
            "mesh {} sub-mesh materials {:?}",
            mesh.mesh_asset_id, mesh.sub_mesh_material_asset_ids
        ),
        DecodedPayload::SkeletonMesh { skeleton, mesh } => format!(
            "skeleton animation {} mesh {} sub-mesh materials {:?}",
            skeleton.skeleton_animation_asset_id, mesh.mesh_asset_id, mesh.sub_mesh_material_asset_ids
        ),
        DecodedPayload::Material(material) => {
            let mut summary = format!(
                "material {} blueprint {} technique {}",
                material.material_asset_id, material.material_blueprint_asset_id, material.material_technique_id
            );
            for property in &material.properties {
                let marker = if property.overwritten { "*" } else { "" };
                summary += &format!("\n    {}{} = {:?}", property.id, marker, property.value);
            }
            summary
        }
        DecodedPayload::Unknown(bytes) => format!("{} raw bytes", bytes.len()),
    }
}
