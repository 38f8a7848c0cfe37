#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use camcred_core::assets::{CaptureTime, MediaAsset, Movie, Photo};
use camcred_core::content_type::ContentType;
use camcred_core::identity::SigningAlg;
use camcred_core::metadata::SystemHostClock;
use camcred_core::traits::Embedder;
use camcred_engine::atomic::{atomic_write, move_file};
use camcred_engine::config::{load_config, SignerConfig};
use camcred_engine::coordinator::SigningCoordinator;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "camcred",
    version,
    about = "Attach content credentials to freshly captured photos and movies."
)]
struct Cli {
    /// Signer config (JSON). Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedder that writes the signed credential.
    #[arg(long, global = true, value_enum, default_value = "trailer")]
    embedder: EmbedderKind,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Signed claim appended after the media bytes (ed25519).
    Trailer,
    /// C2PA manifest store in the native container.
    C2pa,
}

#[derive(Subcommand)]
enum Cmd {
    /// Sign a photo and, optionally, its live-photo movie.
    SignPhoto {
        /// Path to the photo.
        file: PathBuf,

        /// Live-photo companion movie.
        #[arg(long)]
        live_movie: Option<PathBuf>,

        /// Write the result here instead of replacing the photo.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output a JSON report.
        #[arg(long)]
        json: bool,
    },

    /// Sign a movie.
    SignMovie {
        /// Path to the movie.
        file: PathBuf,

        /// Move the result here instead of replacing the movie.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output a JSON report.
        #[arg(long)]
        json: bool,
    },

    /// Print the manifest that signing a file would embed.
    Manifest {
        /// Path to a photo or movie.
        file: PathBuf,
    },

    /// Generate an ed25519 certificate and private key for the trailer embedder.
    Keygen {
        /// Directory to write the resources into.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Also write camcred.json selecting ed25519 and these resources.
        #[arg(long)]
        write_config: bool,

        /// Overwrite existing files.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SignerConfig::default(),
    };
    tracing::debug!(config = ?config, "signer config");

    match cli.cmd {
        Cmd::SignPhoto {
            file,
            live_movie,
            output,
            json,
        } => cmd_sign_photo(
            &config,
            cli.embedder,
            &file,
            live_movie.as_deref(),
            output.as_deref(),
            json,
        ),

        Cmd::SignMovie { file, output, json } => {
            cmd_sign_movie(&config, cli.embedder, &file, output.as_deref(), json)
        }

        Cmd::Manifest { file } => cmd_manifest(&config, cli.embedder, &file),

        Cmd::Keygen {
            out_dir,
            write_config,
            force,
        } => cmd_keygen(&config, &out_dir, write_config, force),
    }
}

fn build_embedder(kind: EmbedderKind) -> Result<Arc<dyn Embedder>> {
    match kind {
        EmbedderKind::Trailer => Ok(Arc::new(camcred_sign::TrailerEmbedder)),
        #[cfg(feature = "c2pa")]
        EmbedderKind::C2pa => Ok(Arc::new(camcred_sign::C2paEmbedder)),
        #[cfg(not(feature = "c2pa"))]
        EmbedderKind::C2pa => bail!("camcred was built without the c2pa feature"),
    }
}

fn build_coordinator(config: &SignerConfig, kind: EmbedderKind) -> Result<SigningCoordinator> {
    Ok(config.coordinator(build_embedder(kind)?))
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("cannot read modification time of {}", path.display()))?;
    Ok(modified.into())
}

/// Load a file as a photo, stamped with its modification time.
fn load_photo(path: &Path, live_movie: Option<&Path>) -> Result<Photo> {
    let data = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let taken = CaptureTime::at_wall_time(&SystemHostClock, modified_time(path)?);
    Ok(Photo::new(data, live_movie.map(Movie::new), taken))
}

fn print_report(report: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

// ── Signing ─────────────────────────────────────────────────────

fn cmd_sign_photo(
    config: &SignerConfig,
    embedder: EmbedderKind,
    file: &Path,
    live_movie: Option<&Path>,
    output: Option<&Path>,
    json_out: bool,
) -> Result<()> {
    let coordinator = build_coordinator(config, embedder)?;
    let original = load_photo(file, live_movie)?;
    let result = coordinator.sign_photo(original.clone());

    // A signed companion comes back in the scratch area and its original is
    // already gone; restore it before anything else can fail.
    let mut movie_signed = false;
    if let (Some(new), Some(old)) = (result.live_photo_movie(), original.live_photo_movie()) {
        if new != old {
            move_file(new.path(), old.path())?;
            movie_signed = true;
        }
    }

    let signed = result.data() != original.data();
    let out = output.unwrap_or(file);
    if signed || out != file {
        atomic_write(out, result.data())?;
    }

    if json_out {
        let mut report = json!({
            "file": file.display().to_string(),
            "output": out.display().to_string(),
            "signed": signed,
        });
        if let Some(movie) = original.live_photo_movie() {
            report["live_movie"] = json!({
                "path": movie.path().display().to_string(),
                "signed": movie_signed,
            });
        }
        print_report(&report)?;
    } else if signed {
        eprintln!("signed {}", out.display());
        if movie_signed {
            if let Some(movie) = original.live_photo_movie() {
                eprintln!("signed {}", movie.path().display());
            }
        }
    } else {
        eprintln!("not signed: {} left unchanged (RUST_LOG=warn for details)", file.display());
    }
    Ok(())
}

fn cmd_sign_movie(
    config: &SignerConfig,
    embedder: EmbedderKind,
    file: &Path,
    output: Option<&Path>,
    json_out: bool,
) -> Result<()> {
    let coordinator = build_coordinator(config, embedder)?;
    let out = output.unwrap_or(file);

    // Signing retires the file it signed, so work on a copy at the output.
    if out != file {
        std::fs::copy(file, out)
            .with_context(|| format!("cannot copy {} to {}", file.display(), out.display()))?;
    }
    let original = Movie::new(out);
    let result = coordinator.sign_movie(original.clone());

    let signed = result != original;
    if signed {
        move_file(result.path(), out)?;
    }

    if json_out {
        print_report(&json!({
            "file": file.display().to_string(),
            "output": out.display().to_string(),
            "signed": signed,
        }))?;
    } else if signed {
        eprintln!("signed {}", out.display());
    } else {
        eprintln!("not signed: {} left unchanged (RUST_LOG=warn for details)", file.display());
    }
    Ok(())
}

fn cmd_manifest(config: &SignerConfig, embedder: EmbedderKind, file: &Path) -> Result<()> {
    let coordinator = build_coordinator(config, embedder)?;
    let is_movie = ContentType::from_path(file).is_some_and(|ct| ct.is_video());
    let asset = if is_movie {
        MediaAsset::Movie(Movie::new(file))
    } else {
        MediaAsset::Photo(load_photo(file, None)?)
    };
    let manifest = coordinator
        .manifest_for(&asset)
        .with_context(|| format!("no manifest for {}", file.display()))?;
    print_report(&manifest.to_value()?)
}

// ── Keys ────────────────────────────────────────────────────────

fn cmd_keygen(config: &SignerConfig, out_dir: &Path, write_config: bool, force: bool) -> Result<()> {
    let cert_path = out_dir.join(&config.certificate_resource);
    let key_path = out_dir.join(&config.private_key_resource);
    let config_path = out_dir.join("camcred.json");

    let mut targets = vec![&cert_path, &key_path];
    if write_config {
        targets.push(&config_path);
    }
    if !force {
        if let Some(existing) = targets.iter().find(|p| p.exists()) {
            bail!("{} exists (use --force to overwrite)", existing.display());
        }
    }

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;
    let (cert_pem, key_pem) = camcred_sign::keys::generate_ed25519_pems()?;
    atomic_write(&cert_path, cert_pem.as_bytes())?;
    atomic_write(&key_path, key_pem.as_bytes())?;
    eprintln!("wrote {}", cert_path.display());
    eprintln!("wrote {}", key_path.display());

    if write_config {
        let generated = SignerConfig {
            resources_dir: PathBuf::from("."),
            algorithm: SigningAlg::Ed25519,
            scratch_dir: None,
            ..config.clone()
        };
        atomic_write(&config_path, serde_json::to_string_pretty(&generated)?.as_bytes())?;
        eprintln!("wrote {}", config_path.display());
    } else if config.algorithm != SigningAlg::Ed25519 {
        eprintln!("note: set \"algorithm\": \"ed25519\" in the config to sign with these keys");
    }
    Ok(())
}
