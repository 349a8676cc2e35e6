//! # kiln CLI Entry Point
//!
//! This is the main executable for the `kiln` command-line tool.
//! It parses CLI arguments using clap and routes commands to the
//! appropriate handlers.
//!
//! ## Command Structure
//!
//! - **Project**: `new`, `init`, `info`
//! - **Build**: `build`, `watch`, `serve`, `clean`
//! - **Shell**: `completion`

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use inquire::Text;
use std::path::Path;

use kiln::build;
use kiln::config;
use kiln::serve;
use kiln::sources;
use kiln::templates;
use kiln::ui;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
    fn SetConsoleCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
        SetConsoleCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "A tiny asset pipeline for static sites", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new site in a fresh directory
    New {
        /// Site name (optional, defaults to interactive)
        name: Option<String>,
    },
    /// Scaffold kiln.toml and starter sources in the current directory
    Init,
    /// Compile styles and scripts, then stamp the cache markers
    Build,
    /// Build once, then rebuild whenever sources change
    Watch,
    /// Build, watch, and serve the site with live reload
    Serve,
    /// Remove the emitted output directories
    Clean,
    /// Show the project layout and source counts
    Info,
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

fn main() -> Result<()> {
    enable_windows_utf8_console();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::New { name }) => create_site(name),
        Some(Commands::Init) => init_site(),
        Some(Commands::Build) => run_build(),
        Some(Commands::Watch) => run_watch(),
        Some(Commands::Serve) => run_serve(),
        Some(Commands::Clean) => {
            let config = config::load()?;
            build::clean(&config)
        }
        Some(Commands::Info) => print_info(),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
        None => {
            print_splash();
            Ok(())
        }
    }
}

fn run_build() -> Result<()> {
    let config = config::load()?;
    let mut pipeline = build::Pipeline::new(config);
    let summary = pipeline.run_once()?;
    build::print_summary(&summary);
    Ok(())
}

fn run_watch() -> Result<()> {
    let config = config::load()?;
    let plan = build::WatchPlan::new(&config, false);
    let mut pipeline = build::Pipeline::new(config.clone());

    report(pipeline.run_once());
    pipeline.set_phase(build::Phase::Watching);

    build::watch(&config.watch, &plan, |batch| match batch {
        build::Batch::Rebuild => {
            println!("{} Change detected. Rebuilding...", "🔄".yellow());
            report(pipeline.run_once());
            pipeline.set_phase(build::Phase::Watching);
        }
        build::Batch::ReloadOnly => {}
    })
}

fn run_serve() -> Result<()> {
    let config = config::load()?;
    let server = serve::DevServer::new();
    let mut pipeline = build::Pipeline::new(config.clone()).with_reload(server.reload_handle());

    // First build happens before the server is up, so the very first
    // request already sees fresh artifacts. A broken build is not fatal
    // here; the watch loop gives the user a path to fix it.
    report(pipeline.run_once());

    let addr = server.start(
        config.serve.root.clone(),
        &config.serve.host,
        config.serve.port,
    )?;
    println!(
        "{} Serving {} at {}",
        "🌐".cyan(),
        config.serve.root.display(),
        format!("http://{addr}").bold().underline()
    );

    let plan = build::WatchPlan::new(&config, true);
    pipeline.set_phase(build::Phase::Watching);

    build::watch(&config.watch, &plan, |batch| match batch {
        build::Batch::Rebuild => {
            println!("{} Change detected. Rebuilding...", "🔄".yellow());
            report(pipeline.run_once());
            pipeline.set_phase(build::Phase::Watching);
        }
        build::Batch::ReloadOnly => {
            println!("{} Page changed. Reloading browsers...", "🔄".cyan());
            pipeline.notify_reload();
        }
    })
}

fn report(result: Result<build::RunSummary>) {
    match result {
        Ok(summary) => build::print_summary(&summary),
        Err(e) => eprintln!("{} Build failed: {e:#}", "x".red()),
    }
}

fn create_site(name_opt: &Option<String>) -> Result<()> {
    let name = match name_opt {
        Some(n) => n.clone(),
        None => Text::new("What is your site called?")
            .with_default("my-site")
            .prompt()?,
    };

    let path = Path::new(&name);
    if path.exists() {
        println!("{} Error: Directory '{}' already exists", "x".red(), name);
        return Ok(());
    }

    let site_name = path
        .file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy();
    templates::scaffold(path, &site_name)?;

    println!("{} Created new site: {}", "✓".green(), name.bold());
    println!("  cd {}\n  kiln serve", name);
    Ok(())
}

fn init_site() -> Result<()> {
    if Path::new(config::CONFIG_FILE).exists() {
        println!(
            "{} Error: Project already initialized ({} exists).",
            "x".red(),
            config::CONFIG_FILE
        );
        return Ok(());
    }

    let current_dir = std::env::current_dir()?;
    let dir_name = current_dir
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("site"))
        .to_string_lossy();

    let name = Text::new("Site name?").with_default(&dir_name).prompt()?;
    templates::scaffold(Path::new("."), &name)?;

    println!(
        "{} Initialized kiln site in current directory.",
        "✓".green()
    );
    Ok(())
}

fn print_info() -> Result<()> {
    let config = config::load()?;

    println!("{} v{}", "kiln".bold().cyan(), env!("CARGO_PKG_VERSION"));
    println!("A tiny asset pipeline for static sites 🔥");
    println!("------------------------------------");
    println!("{}: {}", "Project".bold(), config.project.name);

    let mut table = ui::Table::new(&["Group", "Root", "Files", "Out"]);
    let groups = [
        (sources::SourceGroup::styles(&config), &config.styles.out),
        (sources::SourceGroup::scripts(&config), &config.scripts.out),
    ];
    for (group, out) in groups {
        table.add_row(vec![
            group.name().to_string(),
            group.root().display().to_string(),
            group.scan().len().to_string(),
            out.display().to_string(),
        ]);
    }
    table.print();

    println!("{}: {}", "Page".bold(), config.pages.file.display());
    println!(
        "{}: http://{}:{}",
        "Serve".bold(),
        config.serve.host,
        config.serve.port
    );
    Ok(())
}

fn print_splash() {
    println!();
    println!("   {}", "██   ██ ██ ██      ███    ██".cyan());
    println!("   {}", "██  ██  ██ ██      ████   ██".cyan());
    println!("   {}", "█████   ██ ██      ██ ██  ██".cyan());
    println!("   {}", "██  ██  ██ ██      ██  ██ ██".cyan());
    println!("   {}", "██   ██ ██ ███████ ██   ████".cyan());
    println!();
    println!(
        "   {}",
        "A tiny asset pipeline for static sites".dimmed().italic()
    );
    println!("   {}", format!("v{}", env!("CARGO_PKG_VERSION")).green());
    println!();

    let mut table = ui::Table::new(&["Category", "Commands"]);
    table.add_row(vec![
        "Start".bold().green().to_string(),
        format!("{}, {}", "new".cyan(), "init".cyan()),
    ]);
    table.add_row(vec![
        "Build".bold().yellow().to_string(),
        format!(
            "{}, {}, {}",
            "build".cyan(),
            "watch".cyan(),
            "serve".cyan()
        ),
    ]);
    table.add_row(vec![
        "Tools".bold().magenta().to_string(),
        format!("{}, {}", "clean".cyan(), "info".cyan()),
    ]);
    table.print();

    println!();
    println!("   Run {} for detailed usage.", "kiln --help".white().bold());
    println!();
}
