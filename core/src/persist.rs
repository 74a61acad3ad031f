use crate::{EmbeddingIndex, InteractionMatrix, Snapshot};
use anyhow::{ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

/// How the stored item embeddings were produced. Free-text queries are only
/// meaningful when the server encodes them the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// Every item was encoded by `HashingEncoder` at `MetaFile::dim`.
    Hashing,
    /// Every item shipped its own embedding.
    Precomputed,
    Mixed,
    /// Written before the field existed.
    #[default]
    Unknown,
}

impl EncoderKind {
    pub fn from_counts(encoded: usize, precomputed: usize) -> Self {
        match (encoded, precomputed) {
            (0, 0) => EncoderKind::Unknown,
            (_, 0) => EncoderKind::Hashing,
            (0, _) => EncoderKind::Precomputed,
            _ => EncoderKind::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_items: usize,
    pub num_users: usize,
    pub dim: usize,
    pub created_at: String,
    pub version: u32,
    #[serde(default)]
    pub encoder: EncoderKind,
}

pub struct ArtifactPaths {
    pub root: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn titles(&self) -> PathBuf { self.root.join("titles.bin") }
    fn embeddings(&self) -> PathBuf { self.root.join("embeddings.bin") }
    fn ratings(&self) -> PathBuf { self.root.join("ratings.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn save_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut f = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    bincode::serialize_into(&mut f, value)?;
    f.flush()?;
    Ok(())
}

fn load_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    bincode::deserialize_from(BufReader::new(f)).with_context(|| format!("decoding {}", path.display()))
}

pub fn save_titles(paths: &ArtifactPaths, titles: &[String]) -> Result<()> {
    create_dir_all(&paths.root)?;
    save_bin(&paths.titles(), &titles)
}

pub fn load_titles(paths: &ArtifactPaths) -> Result<Vec<String>> {
    load_bin(&paths.titles())
}

pub fn save_embeddings(paths: &ArtifactPaths, embeddings: &[Vec<f32>]) -> Result<()> {
    create_dir_all(&paths.root)?;
    save_bin(&paths.embeddings(), &embeddings)
}

pub fn load_embeddings(paths: &ArtifactPaths) -> Result<Vec<Vec<f32>>> {
    load_bin(&paths.embeddings())
}

pub fn save_ratings(paths: &ArtifactPaths, ratings: &InteractionMatrix) -> Result<()> {
    create_dir_all(&paths.root)?;
    save_bin(&paths.ratings(), ratings)
}

pub fn load_ratings(paths: &ArtifactPaths) -> Result<InteractionMatrix> {
    load_bin(&paths.ratings())
}

pub fn save_meta(paths: &ArtifactPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &ArtifactPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Load every artifact once and assemble the immutable snapshot served to queries.
pub fn load_snapshot(paths: &ArtifactPaths) -> Result<Snapshot> {
    let meta = load_meta(paths)?;
    ensure!(meta.version == FORMAT_VERSION, "unsupported artifact version {}", meta.version);

    let titles = load_titles(paths)?;
    let embeddings = load_embeddings(paths)?;
    let ratings = load_ratings(paths)?;
    ensure!(titles.len() == meta.num_items, "meta lists {} items, found {} titles", meta.num_items, titles.len());
    ensure!(ratings.n_users() == meta.num_users, "meta lists {} users, matrix has {}", meta.num_users, ratings.n_users());

    let index = EmbeddingIndex::build(&embeddings).context("building embedding index")?;
    ensure!(index.is_empty() || index.dim() == meta.dim, "meta dim {} but embeddings have {}", meta.dim, index.dim());
    tracing::info!(root = %paths.root.display(), created_at = %meta.created_at, "loaded artifacts");
    Ok(Snapshot::new(titles, index, ratings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactions::CsrParts;
    use tempfile::tempdir;

    fn write_all(paths: &ArtifactPaths, num_users: usize) {
        let titles = vec!["Dune".to_string(), "Emma".to_string()];
        let embeddings = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let ratings = InteractionMatrix::from_triplets(2, 2, vec![(0, 1, 4.0), (1, 0, 2.0)]).unwrap();
        save_titles(paths, &titles).unwrap();
        save_embeddings(paths, &embeddings).unwrap();
        save_ratings(paths, &ratings).unwrap();
        let meta = MetaFile {
            num_items: 2,
            num_users,
            dim: 2,
            created_at: "2024-01-01T00:00:00Z".into(),
            version: FORMAT_VERSION,
            encoder: EncoderKind::Precomputed,
        };
        save_meta(paths, &meta).unwrap();
    }

    #[test]
    fn artifacts_load_into_snapshot() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        write_all(&paths, 2);
        let snap = load_snapshot(&paths).unwrap();
        assert_eq!(snap.num_items(), 2);
        assert_eq!(snap.title(1).unwrap(), "Emma");
        assert_eq!(snap.ratings().get(0, 1).unwrap(), 4.0);
        assert_eq!(load_meta(&paths).unwrap().dim, 2);
    }

    #[test]
    fn meta_disagreement_fails_load() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        write_all(&paths, 5);
        assert!(load_snapshot(&paths).is_err());
    }

    #[test]
    fn corrupt_rating_offsets_fail_load() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        write_all(&paths, 2);
        let bad = CsrParts { n_users: 2, n_items: 2, indptr: vec![0, 5, 1], indices: vec![0], data: vec![1.0] };
        save_bin(&paths.ratings(), &bad).unwrap();
        assert!(load_snapshot(&paths).is_err());
    }

    #[test]
    fn meta_without_encoder_reads_as_unknown() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        create_dir_all(&paths.root).unwrap();
        std::fs::write(
            paths.meta(),
            r#"{"num_items":2,"num_users":2,"dim":2,"created_at":"2024-01-01T00:00:00Z","version":1}"#,
        )
        .unwrap();
        assert_eq!(load_meta(&paths).unwrap().encoder, EncoderKind::Unknown);

        write_all(&paths, 2);
        assert_eq!(load_meta(&paths).unwrap().encoder, EncoderKind::Precomputed);
    }

    #[test]
    fn encoder_kind_from_counts() {
        assert_eq!(EncoderKind::from_counts(3, 0), EncoderKind::Hashing);
        assert_eq!(EncoderKind::from_counts(0, 3), EncoderKind::Precomputed);
        assert_eq!(EncoderKind::from_counts(1, 2), EncoderKind::Mixed);
        assert_eq!(EncoderKind::from_counts(0, 0), EncoderKind::Unknown);
    }

    #[test]
    fn missing_directory_fails_load() {
        let dir = tempdir().unwrap();
        assert!(load_snapshot(&ArtifactPaths::new(dir.path().join("nope"))).is_err());
    }
}
