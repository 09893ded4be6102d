use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use openglyph::assets::AssetLoader;
use openglyph::data::chunk::ChunkReader;
use openglyph::map::{Map, read_map};
use openglyph::models::model::{Model, read_model};
use rootcause::prelude::*;
use thiserror::Error;

/// Inspect chunked model (.ALO) and map (.TED) assets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game data directory used to resolve asset names. May be given multiple
    /// times; earlier directories take priority.
    #[clap(short, long = "data-path")]
    data_path: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a model and print its meshes
    Model {
        /// Path to a model file, or a model name under the data paths
        name: String,

        /// Print the whole decoded model as JSON
        #[clap(long)]
        json: bool,
    },
    /// Decode a map and print its environments
    Map {
        /// Path to a map file, or a map name under the data paths
        name: String,

        /// Print the whole decoded map as JSON
        #[clap(long)]
        json: bool,
    },
    /// Dump the raw chunk tree of any chunked file
    Chunks { file: PathBuf },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{kind} {name:?} not found in any data path")]
    NotFound { kind: &'static str, name: String },
}

fn main() -> Result<(), Report> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let loader = AssetLoader::new(args.data_path);

    match args.command {
        Command::Model { name, json } => {
            let model = load_model(&loader, &name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&model)?);
            } else {
                print_model(&model);
            }
        }
        Command::Map { name, json } => {
            let map = load_map(&loader, &name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                print_map(&map);
            }
        }
        Command::Chunks { file } => {
            let file = File::open(&file).context("Failed to open chunk file")?;
            dump_chunks(BufReader::new(file))?;
        }
    }

    Ok(())
}

fn load_model(loader: &AssetLoader, name: &str) -> Result<Model, Report> {
    let path = Path::new(name);
    if path.is_file() {
        let file = File::open(path).context("Failed to open model file")?;
        return Ok(read_model(BufReader::new(file)).context("Failed to decode model")?);
    }

    let model = loader
        .load_model(name)
        .context("Failed to decode model")?
        .ok_or_else(|| {
            Report::new(CliError::NotFound {
                kind: "model",
                name: name.to_string(),
            })
        })?;
    Ok(model)
}

fn load_map(loader: &AssetLoader, name: &str) -> Result<Map, Report> {
    let path = Path::new(name);
    if path.is_file() {
        let file = File::open(path).context("Failed to open map file")?;
        return Ok(read_map(BufReader::new(file)).context("Failed to decode map")?);
    }

    let map = loader
        .load_map(name)
        .context("Failed to decode map")?
        .ok_or_else(|| {
            Report::new(CliError::NotFound {
                kind: "map",
                name: name.to_string(),
            })
        })?;
    Ok(map)
}

fn print_model(model: &Model) {
    println!("{} meshes", model.meshes.len());
    for mesh in &model.meshes {
        println!(
            "{} (lod {}, alt {}{})",
            mesh.name,
            mesh.lod,
            mesh.alt,
            if mesh.visible { "" } else { ", hidden" }
        );
        for material in &mesh.materials {
            println!(
                "  {}: {} vertices, {} indices",
                material.name,
                material.vertices.len(),
                material.indices.len()
            );
            for param in &material.params {
                println!("    {} = {}", param.name, param.value);
            }
        }
    }
}

fn print_map(map: &Map) {
    println!("version 0x{:X}", map.header.version);
    for (i, environment) in map.environments.iter().enumerate() {
        let marker = if i == map.active_environment as usize {
            " (active)"
        } else {
            ""
        };
        println!("environment {i}: {}{marker}", environment.name);
        for skydome in environment.skydomes.iter().filter(|s| !s.name.is_empty()) {
            println!(
                "  skydome {}: scale {}, tilt {}, z angle {}",
                skydome.name, skydome.scale, skydome.tilt, skydome.z_angle
            );
        }
    }
}

fn dump_chunks(file: BufReader<File>) -> Result<(), Report> {
    let mut reader = ChunkReader::new(file).context("Failed to read chunk header")?;
    loop {
        while reader.has_chunk() {
            let indent = "  ".repeat(reader.depth());
            let id = reader.id()?;
            let size = reader.size()?;
            if reader.has_data()? {
                println!("{indent}0x{id:08X} data {size}");
                reader.next()?;
            } else {
                println!("{indent}0x{id:08X} container {size}");
                reader.open()?;
            }
        }

        if reader.depth() == 0 {
            break;
        }
        reader.close()?;
        reader.next()?;
    }
    Ok(())
}
