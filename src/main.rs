use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::{debug, info};

mod app;
mod handler;
mod tui;
mod ui;

use app::{save_plan_pdf, App};
use physique_core::{
    Config, ExportOptions, Goal, OllamaClient, Photo, PhotoSet, PhotoSource, PlanRequester, PlanSession,
    ProfileDraft, SubstitutionPolicy, ValidationError, MAX_REQUEST_IMAGES,
};

#[derive(Parser)]
#[command(name = "physique")]
#[command(version, about = "AI-powered physique assessment with diet and workout plans")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Ollama model to use instead of the configured default
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive interface (default)
    Tui,
    /// Generate a plan from photos without the interface
    Generate {
        /// Uploaded photo (png/jpg/jpeg); repeat for more
        #[arg(short, long = "photo")]
        photos: Vec<PathBuf>,
        /// Photo to use as the camera shot
        #[arg(long)]
        camera: Option<PathBuf>,
        /// build-muscle, lose-fat, get-toned or maintain
        #[arg(short, long, default_value = "build-muscle", value_parser = parse_goal)]
        goal: Goal,
        /// Height in cm
        #[arg(long, default_value = "170")]
        height: u16,
        /// Weight in kg
        #[arg(long, default_value = "70")]
        weight: u16,
        #[arg(long, default_value = "25")]
        age: u16,
        /// Directory for the PDF (defaults to the configured export dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Fail the export instead of replacing characters the PDF font lacks
        #[arg(long)]
        strict_export: bool,
        /// Skip writing the PDF
        #[arg(long)]
        no_pdf: bool,
    },
    /// List available Ollama models
    Models,
}

fn parse_goal(s: &str) -> Result<Goal, String> {
    Goal::from_str(s).ok_or_else(|| {
        let valid: Vec<&str> = Goal::all().iter().map(|g| g.as_str()).collect();
        format!("unknown goal '{}', expected one of: {}", s, valid.join(", "))
    })
}

fn parse_level(s: &str) -> tracing::Level {
    match s.to_uppercase().as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" | "WARNING" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }
    }
}

/// The interface owns the terminal, so it logs to a file. CLI commands log to stderr.
fn setup_logging(level: Option<&str>, to_file: bool) -> Result<()> {
    let level = level.map(parse_level).unwrap_or(tracing::Level::INFO);
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_file {
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("physique-pro")
            .join("logs");
        fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
        let log_file = fs::File::create(log_dir.join("physique.log")).context("Failed to create log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}: {:#}", "Warning: could not read config, using defaults".yellow(), e);
        Config::new()
    });

    let interactive = matches!(cli.command, None | Some(Commands::Tui));
    let level = cli.log_level.as_deref().or(config.log_level.as_deref());
    setup_logging(level, interactive).context("Failed to setup logging")?;

    match cli.command {
        None | Some(Commands::Tui) => run_tui(&config, cli.model).await,
        Some(Commands::Generate {
            photos,
            camera,
            goal,
            height,
            weight,
            age,
            out,
            strict_export,
            no_pdf,
        }) => {
            let draft = ProfileDraft {
                goal,
                height_cm: Some(height),
                weight_kg: Some(weight),
                age: Some(age),
            };
            let options = GenerateOptions {
                photos,
                camera,
                out,
                strict_export,
                no_pdf,
            };
            generate_plan(&config, cli.model, &draft, options).await
        }
        Some(Commands::Models) => list_ollama_models(&config).await,
    }
}

async fn run_tui(config: &Config, model: Option<String>) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(config, model);

    info!(model = %app.selected_model, "interface started");

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

struct GenerateOptions {
    photos: Vec<PathBuf>,
    camera: Option<PathBuf>,
    out: Option<PathBuf>,
    strict_export: bool,
    no_pdf: bool,
}

async fn generate_plan(
    config: &Config,
    model: Option<String>,
    draft: &ProfileDraft,
    options: GenerateOptions,
) -> Result<()> {
    let photos = match load_photos(&options) {
        Ok(photos) => photos,
        Err(e) => {
            print_validation_notice(&e);
            return Ok(());
        }
    };
    if photos.len() > MAX_REQUEST_IMAGES {
        println!(
            "{}",
            format!("Only the first {} photos are sent to the model", MAX_REQUEST_IMAGES).yellow()
        );
    }

    let model = model.unwrap_or_else(|| config.model());
    let ollama = OllamaClient::new(&config.ollama_url());
    let requester = PlanRequester::new(ollama, model.clone()).with_timeout(config.request_timeout());
    let mut session = PlanSession::new();

    // Connection failures are reported by the request itself
    if !photos.is_empty() && matches!(requester.backend().has_model(requester.model()).await, Ok(false)) {
        println!("{}", format!("Model '{}' is not installed", requester.model()).yellow());
        println!("Pull it with: {}", format!("ollama pull {}", requester.model()).bold());
        return Ok(());
    }

    println!("\n{}", "💪 Physique Pro".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("{} {}", "Model:".dimmed(), model.green());
    println!("{}", "Crafting your personalized plan...".dimmed());
    debug!(photos = photos.len(), "generate: sending request");

    let plan = match session.generate(&requester, draft, &photos).await {
        Ok(plan) => plan,
        Err(e) if e.is_warning() => {
            print_validation_notice(&e);
            return Ok(());
        }
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            println!("Make sure Ollama is running: {}", "ollama serve".bold());
            println!("Then pull a model: {}", format!("ollama pull {}", model).bold());
            return Ok(());
        }
    };

    let sections = plan.sections();
    if let Some(assessment) = &sections.assessment {
        println!("\n{}", "Assessment".bold().cyan());
        println!("{}", assessment);
    }
    for (title, section) in [("Diet Plan", &sections.diet), ("Workout Plan", &sections.workout)] {
        println!("\n{}", title.bold().cyan());
        if let Some(warning) = &section.warning {
            println!("{}", warning.to_string().yellow());
        }
        println!("{}", section.text);
    }

    if options.no_pdf {
        return Ok(());
    }

    let export = ExportOptions {
        policy: if options.strict_export {
            SubstitutionPolicy::Strict
        } else {
            SubstitutionPolicy::Replace
        },
        ..ExportOptions::default()
    };
    let dir = options.out.unwrap_or_else(|| config.export_dir());
    match save_plan_pdf(plan, &dir, &export) {
        Ok(path) => println!("\n{} {}", "Saved".green(), path.display()),
        Err(e) => println!("\n{}: {:#}", "Export failed".red(), e),
    }

    Ok(())
}

fn load_photos(options: &GenerateOptions) -> Result<PhotoSet, ValidationError> {
    let mut photos = PhotoSet::new();
    if let Some(path) = &options.camera {
        photos.set_camera(Photo::load(path, PhotoSource::Camera)?);
    }
    for path in &options.photos {
        photos.add_upload(Photo::load(path, PhotoSource::Upload)?);
    }
    Ok(photos)
}

fn print_validation_notice(error: &dyn std::fmt::Display) {
    println!("{}", format!("Please provide all details and at least one photo! ({})", error).yellow());
}

async fn list_ollama_models(config: &Config) -> Result<()> {
    let ollama = OllamaClient::new(&config.ollama_url());

    println!("\n{}", "🤖 Available Ollama Models".bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    match ollama.list_models().await {
        Ok(models) => {
            if models.is_empty() {
                println!("{}", "No models found. Pull a model with: ollama pull gemma3:4b".yellow());
            } else {
                let current = config.model();
                for model in models {
                    if model == current {
                        println!("  • {} {}", model.green().bold(), "(default)".dimmed());
                    } else {
                        println!("  • {}", model.green());
                    }
                }
            }
        }
        Err(e) => {
            println!("{}: {}", "Error connecting to Ollama".red(), e);
            println!("Make sure Ollama is running: {}", "ollama serve".bold());
            println!("Then pull a model: {}", "ollama pull gemma3:4b".bold());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_args() {
        let cli = Cli::try_parse_from([
            "physique", "generate", "--photo", "a.png", "--photo", "b.jpg", "--goal", "lose-fat", "--age", "30",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Generate { photos, goal, age, height, .. }) => {
                assert_eq!(photos.len(), 2);
                assert_eq!(goal, Goal::LoseFat);
                assert_eq!(age, 30);
                assert_eq!(height, 170);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_unknown_goal_rejected() {
        assert!(Cli::try_parse_from(["physique", "generate", "--goal", "bulk"]).is_err());
    }

    #[test]
    fn test_no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["physique", "--log-level", "debug"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    fn options(photos: Vec<PathBuf>) -> GenerateOptions {
        GenerateOptions {
            photos,
            camera: None,
            out: None,
            strict_export: false,
            no_pdf: true,
        }
    }

    #[test]
    fn test_load_photos_rejects_unsupported_file() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"not an image").unwrap();

        let err = load_photos(&options(vec![notes])).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedImage(_)));

        let err = load_photos(&options(vec![dir.path().join("gone.png")])).unwrap_err();
        assert!(matches!(err, ValidationError::ImageRead { .. }));
    }

    #[tokio::test]
    async fn test_generate_with_bad_photo_exits_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"not an image").unwrap();

        let result = generate_plan(&Config::new(), None, &ProfileDraft::default(), options(vec![notes])).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("nope"), tracing::Level::INFO);
    }
}
