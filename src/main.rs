use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use memmap2::Mmap;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use psounpack::data::prs;
use psounpack::data::qst::parse_qst;
use psounpack::diagnostics::Diagnostics;
use psounpack::models::nj::{NjGeometry, parse_nj};
use psounpack::quest::script::{Instruction, ObjectCodeDecoder};
use psounpack::quest::{LoadedQuest, parse_quest, write_quest_qst};

/// Inspect and convert Phantasy Star Online: Blue Burst quests and models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of one or more .qst files
    Info {
        /// Print the full quest as JSON
        #[clap(long)]
        json: bool,

        /// .qst files or glob patterns
        #[clap(required = true)]
        paths: Vec<String>,
    },
    /// Extract the decompressed .dat and .bin files of a .qst
    Unpack {
        /// Output directory
        #[clap(short, long, default_value = ".")]
        out_dir: PathBuf,

        qst: PathBuf,
    },
    /// Parse a .qst and write it back out
    Repack {
        /// Output .qst file
        #[clap(short, long)]
        out: PathBuf,

        qst: PathBuf,
    },
    /// Parse a .nj model
    Model {
        /// Write the triangles as a Wavefront OBJ file
        #[clap(long)]
        obj: Option<PathBuf>,

        nj: PathBuf,
    },
}

/// This tool ships without an instruction set, so scripts are never decoded.
struct NoDecoder;

impl ObjectCodeDecoder for NoDecoder {
    fn decode(&self, _object_code: &[u8]) -> Result<Vec<Instruction>, String> {
        Err("no instruction set decoder available".to_string())
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let before = paths.len();
        for entry in glob::glob(pattern).wrap_err("invalid glob pattern")? {
            paths.push(entry?);
        }
        if paths.len() == before {
            paths.push(PathBuf::from(pattern));
        }
    }
    Ok(paths)
}

fn load_quest(path: &Path) -> Result<LoadedQuest> {
    let mmap = map_file(path)?;
    parse_quest(&mmap[..], &NoDecoder).map_err(|e| eyre::eyre!("{}: {e:?}", path.display()))
}

fn summarize(path: &Path, loaded: &LoadedQuest) -> String {
    let quest = &loaded.quest;
    let mut out = String::new();
    let _ = writeln!(out, "{}", path.display());
    let _ = writeln!(out, "  id:       {}", quest.id);
    let _ = writeln!(out, "  name:     {}", quest.name);
    let _ = writeln!(out, "  episode:  {}", quest.episode);
    let _ = writeln!(out, "  objects:  {}", quest.objects.len());
    let _ = writeln!(out, "  npcs:     {}", quest.npcs.len());
    for (area_id, variant_id) in &quest.area_variants {
        let _ = writeln!(out, "  area {area_id}: variant {variant_id}");
    }
    for warning in &loaded.warnings {
        let _ = writeln!(out, "  warning: {warning}");
    }
    out
}

fn info(patterns: &[String], json: bool) -> Result<()> {
    let paths = expand_paths(patterns)?;
    let results: Vec<(PathBuf, Result<LoadedQuest>)> = paths
        .into_par_iter()
        .map(|path| {
            let loaded = load_quest(&path);
            (path, loaded)
        })
        .collect();

    for (path, loaded) in results {
        match loaded {
            Ok(loaded) if json => println!("{}", serde_json::to_string_pretty(&loaded)?),
            Ok(loaded) => print!("{}", summarize(&path, &loaded)),
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}

fn unpack(qst_path: &Path, out_dir: &Path) -> Result<()> {
    let mmap = map_file(qst_path)?;
    let mut diag = Diagnostics::new();
    let qst = parse_qst(&mmap[..], &mut diag).wrap_err("failed to parse quest container")?;

    fs::create_dir_all(out_dir)?;
    for file in &qst.files {
        let data = prs::decompress(&file.data)
            .wrap_err_with(|| format!("failed to decompress {}", file.name))?;
        let out_path = out_dir.join(file.name.trim());
        fs::write(&out_path, data)?;
        println!("wrote {}", out_path.display());
    }
    Ok(())
}

fn repack(qst_path: &Path, out: &Path) -> Result<()> {
    let loaded = load_quest(qst_path)?;
    let stem = out
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| eyre::eyre!("output path has no usable file name"))?;

    let data = write_quest_qst(&loaded.quest, stem)
        .map_err(|e| eyre::eyre!("failed to write quest: {e:?}"))?;
    fs::write(out, data)?;
    Ok(())
}

fn to_obj(geometry: &NjGeometry) -> String {
    let mut out = String::new();
    for p in geometry.positions.chunks_exact(3) {
        let _ = writeln!(out, "v {} {} {}", p[0], p[1], p[2]);
    }
    for n in geometry.normals.chunks_exact(3) {
        let _ = writeln!(out, "vn {} {} {}", n[0], n[1], n[2]);
    }
    for t in 0..geometry.triangle_count() {
        let i = 3 * t + 1;
        let _ = writeln!(out, "f {i}//{i} {}//{} {}//{}", i + 1, i + 1, i + 2, i + 2);
    }
    out
}

fn model(nj_path: &Path, obj: Option<&Path>) -> Result<()> {
    let mmap = map_file(nj_path)?;
    let mut diag = Diagnostics::new();
    let geometry = parse_nj(&mmap[..], &mut diag)
        .map_err(|e| eyre::eyre!("{}: {e:?}", nj_path.display()))?
        .ok_or_else(|| eyre::eyre!("{} contains no NJCM chunk", nj_path.display()))?;

    println!(
        "{}: {} triangles, {} warnings",
        nj_path.display(),
        geometry.triangle_count(),
        diag.warnings().len()
    );

    if let Some(obj) = obj {
        fs::write(obj, to_obj(&geometry))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Info { json, paths } => info(&paths, json),
        Command::Unpack { out_dir, qst } => unpack(&qst, &out_dir),
        Command::Repack { out, qst } => repack(&qst, &out),
        Command::Model { obj, nj } => model(&nj, obj.as_deref()),
    }
}
