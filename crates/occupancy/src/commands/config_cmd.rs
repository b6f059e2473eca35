//! Config subcommand handlers.

use tabled::Tabled;

use occupancy_config::{ConfigIssue, load_file, resolve_path, write_sample_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Location")]
    subject: String,
    #[tabled(rename = "Problem")]
    message: String,
}

impl From<&ConfigIssue> for IssueRow {
    fn from(issue: &ConfigIssue) -> Self {
        Self {
            subject: issue.subject.clone(),
            message: issue.message.clone(),
        }
    }
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = resolve_path(global.config.as_deref());

    match &args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let file = load_file(&path)?;
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => file.to_toml()?,
                OutputFormat::Json => output::render_json_pretty(&file)?,
                OutputFormat::JsonCompact => output::render_json_compact(&file)?,
                OutputFormat::Yaml => output::render_yaml(&file)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Check => {
            let config = load_file(&path)?.to_tracker_config()?;
            let issues = occupancy_config::lint(&config);
            if issues.is_empty() && matches!(global.output, OutputFormat::Table) {
                output::print_output(
                    &format!(
                        "Configuration OK: {} areas, {} sensors ({})",
                        config.areas.len(),
                        config.sensors.len(),
                        path.display()
                    ),
                    global.quiet,
                );
                return Ok(());
            }
            let out = output::render_list(
                &global.output,
                &issues,
                |i| IssueRow::from(i),
                ToString::to_string,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            write_sample_config(&path, *force)?;
            if !global.quiet {
                eprintln!("Wrote sample configuration to {}", path.display());
            }
            Ok(())
        }
    }
}
