//! intropack command line
//!
//! Drives one demo build: loads the demo's configuration, runs the shader
//! preparation pipeline, and writes the generated C++ sources into the build
//! directory for the engine compile that follows.

use anyhow::{Context, bail};
use clap::Parser;
use intropack_build::{
    build_shader, codegen,
    config::{CaptureConfig, Config},
    hooks::{self, Hooks},
    minify::{MinifyTool, ShaderMinifierTool},
    providers,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the demo build.
#[derive(Parser)]
#[command(version, about = "Shader build pipeline for size-coded demos")]
struct Args {
    /// Demo directory containing config.yml and the shader source
    #[arg(long, default_value = "demo")]
    directory: PathBuf,

    /// Build a debugging version
    #[arg(long, short = 'd')]
    debug: bool,

    /// Skip the external shader minifier
    #[arg(long)]
    no_minify: bool,

    /// Build at the fixed capture resolution
    #[arg(long)]
    capture: bool,

    /// Engine template for the generated main source
    #[arg(long, default_value = "engine/main-template.cpp")]
    main_template: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.directory).context("loading configuration")?;
    config.debug = args.debug;
    config.minify = !args.no_minify;
    if args.capture && config.capture.is_none() {
        config.capture = Some(CaptureConfig::default());
    }
    config.validate()?;

    let minifier_tool = if config.minify {
        let Some(executable) = config.tools.shader_minifier.clone() else {
            bail!("tools.shader-minifier is required to minify");
        };
        Some(ShaderMinifierTool {
            executable,
            mono: config.tools.mono.clone(),
        })
    } else {
        None
    };
    let minifier = minifier_tool.as_ref().map(|tool| tool as &dyn MinifyTool);

    let provider = providers::from_config(&config)?;
    let definition = build_shader(&config, provider.as_ref(), minifier).context("preparing shader")?;

    let mut collected_hooks = Hooks::new();
    let hooks_path = config.directory.join(&config.demo.hooks);
    // The hooks file is optional; a demo without host-side hooks is fine.
    if hooks_path.exists() {
        hooks::add_hooks_file(&mut collected_hooks, &hooks_path).context("collecting hooks")?;
    }

    fs::create_dir_all(&config.paths.build)?;

    let header_path = config.paths.build.join("demo-data.hpp");
    fs::write(&header_path, codegen::demo_data_header(&config, &definition, &collected_hooks))?;
    info!("wrote {}", header_path.display());

    if args.main_template.exists() {
        let template = fs::read_to_string(&args.main_template)?;
        let main_path = config.paths.build.join("main.cpp");
        fs::write(&main_path, codegen::main_source(&collected_hooks, &template)?)?;
        info!("wrote {}", main_path.display());
    }

    Ok(())
}
