use anyhow::{bail, Context, Result};
use bookrec_core::persist::{
    load_meta, save_embeddings, save_meta, save_ratings, save_titles, ArtifactPaths, EncoderKind, MetaFile,
    FORMAT_VERSION,
};
use bookrec_core::{EmbeddingIndex, HashingEncoder, InteractionMatrix, TextEncoder};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputItem {
    title: String,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InputRating {
    user: u32,
    item: u32,
    rating: f32,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Pack catalog embeddings and ratings into serving artifacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build artifacts from item JSON/JSONL (file or directory) and a ratings JSONL file
    Build {
        /// Items input path; item ids follow input order
        #[arg(long)]
        items: String,
        /// Ratings JSONL with {user, item, rating} lines
        #[arg(long)]
        ratings: Option<String>,
        /// Output artifact directory
        #[arg(long)]
        output: String,
        /// Encode items lacking an embedding with the hashing encoder at this dimension
        #[arg(long)]
        dim: Option<usize>,
    },
    /// Print the metadata of an artifact directory
    Inspect {
        #[arg(long)]
        artifacts: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { items, ratings, output, dim } => {
            build_artifacts(Path::new(&items), ratings.as_deref().map(Path::new), Path::new(&output), dim)?;
            Ok(())
        }
        Commands::Inspect { artifacts } => {
            let meta = load_meta(&ArtifactPaths::new(&artifacts))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
    }
}

fn build_artifacts(items: &Path, ratings: Option<&Path>, output: &Path, dim: Option<usize>) -> Result<MetaFile> {
    let encoder = dim.map(HashingEncoder::new).transpose()?;
    let mut titles = Vec::new();
    let mut embeddings = Vec::new();
    let mut precomputed = 0;
    for file in input_files(items)? {
        for item in read_items(&file)? {
            precomputed += usize::from(item.embedding.is_some());
            let vector = embed_item(&item, encoder.as_ref())
                .with_context(|| format!("item {} ({:?}) in {}", titles.len(), item.title, file.display()))?;
            titles.push(item.title);
            embeddings.push(vector);
        }
    }
    // Fails early on ragged dimensions before anything is written.
    let index = EmbeddingIndex::build(&embeddings)?;
    let encoder_kind = EncoderKind::from_counts(titles.len() - precomputed, precomputed);
    if encoder_kind == EncoderKind::Mixed {
        tracing::warn!(precomputed, num_items = titles.len(), "mixing supplied and hashed embeddings");
    }
    tracing::info!(num_items = titles.len(), dim = index.dim(), encoder = ?encoder_kind, "ingested items");

    let triplets = match ratings {
        Some(path) => read_ratings(path)?,
        None => Vec::new(),
    };
    let num_users = triplets.iter().map(|&(u, _, _)| u as usize + 1).max().unwrap_or(0);
    let matrix = InteractionMatrix::from_triplets(num_users, titles.len(), triplets)?;
    tracing::info!(num_users, nnz = matrix.nnz(), "ingested ratings");

    let paths = ArtifactPaths::new(output);
    save_titles(&paths, &titles)?;
    save_embeddings(&paths, &embeddings)?;
    save_ratings(&paths, &matrix)?;
    let meta = MetaFile {
        num_items: titles.len(),
        num_users,
        dim: index.dim(),
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
        encoder: encoder_kind,
    };
    save_meta(&paths, &meta)?;

    tracing::info!(output = %output.display(), "artifact build complete");
    Ok(meta)
}

fn embed_item(item: &InputItem, encoder: Option<&HashingEncoder>) -> Result<Vec<f32>> {
    if let Some(v) = &item.embedding {
        return Ok(v.clone());
    }
    let Some(encoder) = encoder else {
        bail!("no embedding given and no --dim to encode one");
    };
    let text = item.description.as_deref().unwrap_or(&item.title);
    Ok(encoder.encode(text)?)
}

fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("items input {} does not exist", input.display());
    }
    Ok(files)
}

fn read_items(file: &Path) -> Result<Vec<InputItem>> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut items = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            items.push(serde_json::from_str(&line)?);
        }
        return Ok(items);
    }
    match serde_json::from_reader::<_, serde_json::Value>(reader)? {
        serde_json::Value::Array(arr) => Ok(arr.into_iter().map(serde_json::from_value).collect::<Result<_, _>>()?),
        v @ serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(v)?]),
        _ => Ok(Vec::new()),
    }
}

fn read_ratings(file: &Path) -> Result<Vec<(u32, u32, f32)>> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let r: InputRating = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        out.push((r.user, r.item, r.rating));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookrec_core::persist::load_snapshot;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builds_loadable_artifacts() {
        let dir = tempdir().unwrap();
        let items = dir.path().join("items");
        fs::create_dir_all(&items).unwrap();
        fs::write(
            items.join("a.jsonl"),
            "{\"title\":\"Sentinel\",\"embedding\":[0.0,0.0]}\n{\"title\":\"Dune\",\"embedding\":[1.0,0.0]}\n",
        )
        .unwrap();
        fs::write(items.join("b.json"), "[{\"title\":\"Emma\",\"embedding\":[0.0,1.0]}]").unwrap();
        let ratings = dir.path().join("ratings.jsonl");
        fs::write(&ratings, "{\"user\":0,\"item\":1,\"rating\":5}\n\n{\"user\":2,\"item\":2,\"rating\":0}\n").unwrap();

        let out = dir.path().join("out");
        let meta = build_artifacts(&items, Some(&ratings), &out, None).unwrap();
        assert_eq!((meta.num_items, meta.num_users, meta.dim), (3, 3, 2));
        assert_eq!(meta.encoder, EncoderKind::Precomputed);

        let snap = load_snapshot(&ArtifactPaths::new(&out)).unwrap();
        assert_eq!(snap.title(2).unwrap(), "Emma");
        assert_eq!(snap.ratings().nnz(), 1);
    }

    #[test]
    fn encodes_descriptions_when_dim_given() {
        let dir = tempdir().unwrap();
        let items = dir.path().join("items.json");
        fs::write(&items, "[{\"title\":\"Dune\",\"description\":\"desert planet spice\"},{\"title\":\"Emma\"}]").unwrap();
        let out = dir.path().join("out");

        assert!(build_artifacts(&items, None, &out, None).is_err());
        let meta = build_artifacts(&items, None, &out, Some(16)).unwrap();
        assert_eq!((meta.num_items, meta.num_users, meta.dim), (2, 0, 16));
        assert_eq!(meta.encoder, EncoderKind::Hashing);
        assert_eq!(load_meta(&ArtifactPaths::new(&out)).unwrap().encoder, EncoderKind::Hashing);
    }

    #[test]
    fn mixed_embedding_sources_are_recorded() {
        let dir = tempdir().unwrap();
        let items = dir.path().join("items.jsonl");
        fs::write(&items, "{\"title\":\"Dune\",\"embedding\":[1.0,0.0,0.0,0.0]}\n{\"title\":\"Emma\"}\n").unwrap();
        let meta = build_artifacts(&items, None, &dir.path().join("out"), Some(4)).unwrap();
        assert_eq!(meta.encoder, EncoderKind::Mixed);
    }

    #[test]
    fn ratings_must_reference_known_items() {
        let dir = tempdir().unwrap();
        let items = dir.path().join("items.jsonl");
        fs::write(&items, "{\"title\":\"Dune\",\"embedding\":[1.0]}\n").unwrap();
        let ratings = dir.path().join("ratings.jsonl");
        fs::write(&ratings, "{\"user\":0,\"item\":4,\"rating\":3}\n").unwrap();
        assert!(build_artifacts(&items, Some(&ratings), &dir.path().join("out"), None).is_err());
    }
}
