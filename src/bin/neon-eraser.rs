use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::Parser;

use neon_eraser::location::short_label;
use neon_eraser::{
    Bounds, GeminiClient, ImageSource, Pointer, ServiceConfig, StateKind, TargetPoint, Workflow,
    DOWNLOAD_FILE_NAME,
};

#[derive(Parser)]
#[command(
    name = "neon-eraser",
    about = "Remove a watermark near a chosen point using an AI image-editing service",
    version,
    after_help = "Simple usage: neon-eraser <image>  (targets the bottom-right corner)\n\n\
                  The API key is read from --api-key, GEMINI_API_KEY or API_KEY \
                  (a .env file in the working directory is honoured)."
)]
struct Cli {
    /// Input image (PNG, JPEG or WEBP)
    input: PathBuf,

    /// Output file or directory (default: ./neon-erased.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Watermark position as percentages X,Y of the image (default: 85,85)
    #[arg(short, long, value_parser = parse_coords, conflicts_with = "click")]
    target: Option<Coords>,

    /// Watermark position as pixel coordinates X,Y on the image
    #[arg(short, long, value_parser = parse_coords)]
    click: Option<Coords>,

    /// API key for the edit service
    #[arg(long)]
    api_key: Option<String>,

    /// Model to request the edit from
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the edit service
    #[arg(long)]
    endpoint: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy)]
struct Coords {
    x: f32,
    y: f32,
}

impl FromStr for Coords {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f32>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("'{v}' is not a number"))
        };
        Ok(Self {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

fn parse_coords(s: &str) -> Result<Coords, String> {
    s.parse()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let env_file = PathBuf::from(".env");
    logger(Some(&env_file), level).init();

    process::exit(run(cli).await);
}

/// Load `.env` before anything reads the environment, so `RUST_LOG` set there applies.
fn logger(env_file: Option<&Path>, level: &str) -> env_logger::Builder {
    if let Some(path) = env_file {
        if let Err(e) = dotenvy::from_path(path) {
            if !e.not_found() {
                eprintln!("Warning: failed to load {}: {e}", path.display());
            }
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
}

async fn run(cli: Cli) -> i32 {
    let mut config = ServiceConfig::from_env();
    if let Some(key) = cli.api_key {
        config.api_key = Some(key);
    }
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    let client = GeminiClient::new(config);

    let filename = cli.input.file_name().map_or_else(
        || cli.input.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    let mut workflow = Workflow::new();
    workflow
        .select_file(ImageSource::Path(cli.input.clone()))
        .await;
    if workflow.kind() != StateKind::Previewing {
        eprintln!("[FAIL] {filename}: {}", workflow.status().detail);
        return 1;
    }

    if let Some(t) = cli.target {
        workflow.set_target(TargetPoint::new(t.x, t.y));
    } else if let Some(c) = cli.click {
        let (width, height) = workflow
            .state()
            .session()
            .map_or((0, 0), |s| s.image().dimensions());
        workflow.click(Pointer { x: c.x, y: c.y }, Bounds::of_size(width, height));
    }

    if !cli.quiet {
        if let (Some(target), Some(phrase)) = (workflow.target(), workflow.phrase()) {
            eprintln!(
                "Target: {} ({:.0}%, {:.0}%)",
                short_label(phrase),
                target.x,
                target.y
            );
        }
        let status = workflow.status();
        eprintln!("{}: {}", status.title, status.detail);
    }

    workflow.process(&client).await;

    let Some(download) = workflow.download() else {
        eprintln!("[FAIL] {filename}: {}", workflow.status().detail);
        return 1;
    };

    match download.bytes() {
        Ok(bytes) => {
            if let Err(e) = image::load_from_memory(&bytes) {
                eprintln!("[FAIL] {filename}: service returned an undecodable image: {e}");
                return 1;
            }
        }
        Err(e) => {
            eprintln!("[FAIL] {filename}: {e}");
            return 1;
        }
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(DOWNLOAD_FILE_NAME));
    match download.save_to(&output) {
        Ok(path) => {
            if !cli.quiet {
                eprintln!("[OK] {filename} -> {}", path.display());
            }
            0
        }
        Err(e) => {
            eprintln!("[FAIL] {filename}: Failed to save: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_parse_pairs() {
        let c: Coords = "12.5, 80".parse().unwrap();
        assert!((c.x - 12.5).abs() < f32::EPSILON);
        assert!((c.y - 80.0).abs() < f32::EPSILON);
    }

    #[test]
    fn coords_reject_malformed_input() {
        assert!("12".parse::<Coords>().is_err());
        assert!("a,b".parse::<Coords>().is_err());
        assert!("NaN,1".parse::<Coords>().is_err());
    }

    #[test]
    fn log_filter_from_env_file_applies() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let dir = std::env::temp_dir().join(format!("neon-eraser-env-{}", process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let env_file = dir.join(".env");
        std::fs::write(&env_file, "RUST_LOG=trace\n").unwrap();

        let logger = logger(Some(&env_file), "warn").build();
        assert_eq!(logger.filter(), log::LevelFilter::Trace);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cli_rejects_target_with_click() {
        let parsed = Cli::try_parse_from(["neon-eraser", "a.png", "-t", "1,1", "-c", "2,2"]);
        assert!(parsed.is_err());
    }
}
