//! Shader pipeline inspection tool
//!
//! Runs the shader preparation pipeline for a demo directory, without
//! invoking the external minifier, and dumps the resolved definition as
//! JSON to stdout. Useful for checking what survives resolution and which
//! slot each uniform ends up in before committing to a full build.

use intropack_build::{build_shader, config::Config, providers};
use std::env;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <demo-directory>", args[0]);
        eprintln!("Resolves the demo's shader and dumps the definition to stdout");
        process::exit(1);
    }

    match run(Path::new(&args[1])) {
        Ok(json) => println!("{json}"),
        Err(error) => {
            eprintln!("Error: {error}");
            process::exit(1);
        }
    }
}

fn run(directory: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let mut config = Config::load(directory)?;
    config.minify = false;
    config.validate()?;

    let provider = providers::from_config(&config)?;
    let definition = build_shader(&config, provider.as_ref(), None)?;

    Ok(serde_json::to_string_pretty(&definition)?)
}
