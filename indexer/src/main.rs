use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quarry_core::index::{DocMeta, IndexBuilder};
use quarry_core::persist::{save_index, IndexPaths, MetaFile};
use quarry_core::tokenizer::Analyzer;
use quarry_core::DocId;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    title: String,
    body: String,
}

#[derive(Parser)]
#[command(name = "quarry-indexer")]
#[command(about = "Build a positional inverted index from a text corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of .txt files or JSON/JSONL documents
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Stop-word list file, one word per line; defaults to the built-in English list
        #[arg(long)]
        stopwords: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stopwords } => {
            build_index(&input, &output, stopwords.as_deref())
        }
    }
}

fn build_index(input: &str, output: &str, stopwords: Option<&str>) -> Result<()> {
    let input_path = Path::new(input);
    let out_paths = IndexPaths::new(output);
    fs::create_dir_all(&out_paths.root)?;
    fs::create_dir_all(out_paths.root.join("texts"))?;

    let analyzer = match stopwords {
        Some(path) => match Analyzer::from_stopwords_file(path) {
            Ok(analyzer) => analyzer,
            Err(err) => {
                tracing::warn!(path, "stop-word list unreadable, using built-in list: {err:#}");
                Analyzer::default()
            }
        },
        None => Analyzer::default(),
    };

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "txt" | "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    // Doc ids are assigned in ingest order; a sorted file list keeps the
    // index identical across runs over the same corpus.
    files.sort();

    if files.is_empty() {
        tracing::warn!(input, "no .txt, .json, or .jsonl files found");
    }

    let mut builder = IndexBuilder::new();
    let mut failed: Vec<(PathBuf, anyhow::Error)> = Vec::new();
    for file in files {
        let result = match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => index_jsonl(&file, &analyzer, &mut builder, &out_paths),
            Some("json") => index_json(&file, &analyzer, &mut builder, &out_paths),
            _ => index_text_file(&file, &analyzer, &mut builder, &out_paths),
        };
        if let Err(err) = result {
            failed.push((file, err));
        }
    }

    let index = builder.finish();
    tracing::info!(
        num_docs = index.num_docs,
        num_terms = index.num_terms(),
        failed = failed.len(),
        "ingested documents"
    );
    for (file, err) in &failed {
        tracing::warn!(file = %file.display(), "skipped document: {err:#}");
    }

    let meta = MetaFile {
        num_docs: index.num_docs,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: 1,
    };
    save_index(&out_paths, &index, &meta)?;

    tracing::info!(output, "index build complete");
    Ok(())
}

/// A .txt file becomes one document: external id = file name, title = file
/// stem. The corpus loader owns decoding, so undecodable bytes are replaced
/// rather than failing the document.
fn index_text_file(
    file: &Path,
    analyzer: &Analyzer,
    builder: &mut IndexBuilder,
    out_paths: &IndexPaths,
) -> Result<()> {
    let raw = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let body = String::from_utf8_lossy(&raw);
    let external_id = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let title = file
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| external_id.clone());
    ingest_doc(external_id, title, &body, analyzer, builder, out_paths)?;
    Ok(())
}

fn index_jsonl(
    file: &Path,
    analyzer: &Analyzer,
    builder: &mut IndexBuilder,
    out_paths: &IndexPaths,
) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: InputDoc = serde_json::from_str(&line)?;
        ingest_doc(doc.id, doc.title, &doc.body, analyzer, builder, out_paths)?;
    }
    Ok(())
}

fn index_json(
    file: &Path,
    analyzer: &Analyzer,
    builder: &mut IndexBuilder,
    out_paths: &IndexPaths,
) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                ingest_doc(doc.id, doc.title, &doc.body, analyzer, builder, out_paths)?;
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            ingest_doc(doc.id, doc.title, &doc.body, analyzer, builder, out_paths)?;
        }
        _ => {}
    }
    Ok(())
}

fn ingest_doc(
    external_id: String,
    title: String,
    body: &str,
    analyzer: &Analyzer,
    builder: &mut IndexBuilder,
    out_paths: &IndexPaths,
) -> Result<DocId> {
    let tokens = analyzer.analyze(body);
    let doc_id = builder.add_document(DocMeta { external_id, title, text_path: None }, &tokens);

    // Keep the full text next to the index for snippet extraction.
    let text_rel = format!("texts/{doc_id}.txt");
    fs::write(out_paths.root.join(&text_rel), body)?;
    if let Some(meta) = builder.doc_meta_mut(doc_id) {
        meta.text_path = Some(text_rel);
    }
    Ok(doc_id)
}
