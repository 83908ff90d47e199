pub mod handlers;

use crate::presentation::cli::{Cli, Commands, ProjectCommands};
use clap::Parser;
use crp_core::config::Settings;
use crp_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(base) = cli.base {
        settings.project_base = base;
    }

    match cli.command {
        Commands::Project(cmd) => match cmd {
            ProjectCommands::Show { project, user } => {
                handlers::handle_project_show(settings, project, user)
            }
            ProjectCommands::Discover { user } => handlers::handle_project_discover(settings, user),
        },
        Commands::Counts { project, user, qc } => {
            handlers::handle_counts(settings, project, user, qc)
        }
        Commands::Resolve {
            project,
            user,
            qc,
            sub_category,
            start,
            count,
            cursor,
        } => handlers::handle_resolve(
            settings,
            project,
            user,
            qc,
            sub_category,
            start,
            count,
            cursor,
        ),
        Commands::Assemble {
            user,
            file,
            total,
            out_dir,
            fragments,
        } => handlers::handle_assemble(settings, user, file, total, out_dir, fragments),
    }
}
