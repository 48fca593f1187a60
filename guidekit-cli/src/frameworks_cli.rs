//! Guidekit framework commands
//!
//! Browse the catalog, install frameworks into the workspace and keep
//! them up to date.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use guidekit_core::lifecycle::{ConflictChoice, InstalledRecord, Resolution};
use guidekit_core::{
    Category, DecisionProvider, FrameworkDefinition, InstallOptions, LifecycleManager,
    RemoveOutcome,
};

use crate::prompt::{PolicyDecisionProvider, PromptDecisionProvider};

/// What to do when an install target already exists
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConflictPolicy {
    Overwrite,
    Merge,
    Keep,
    Cancel,
}

impl From<ConflictPolicy> for ConflictChoice {
    fn from(policy: ConflictPolicy) -> Self {
        match policy {
            ConflictPolicy::Overwrite => ConflictChoice::Overwrite,
            ConflictPolicy::Merge => ConflictChoice::Merge,
            ConflictPolicy::Keep => ConflictChoice::Keep,
            ConflictPolicy::Cancel => ConflictChoice::Cancel,
        }
    }
}

/// Framework category filter
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Architecture,
    Testing,
    Security,
    Devops,
    Cloud,
    Infrastructure,
    WorkManagement,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Architecture => Category::Architecture,
            CategoryArg::Testing => Category::Testing,
            CategoryArg::Security => Category::Security,
            CategoryArg::Devops => Category::Devops,
            CategoryArg::Cloud => Category::Cloud,
            CategoryArg::Infrastructure => Category::Infrastructure,
            CategoryArg::WorkManagement => Category::WorkManagement,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum FrameworkCommand {
    /// List every framework in the catalog
    List {
        /// Only show one category
        #[clap(long, value_enum)]
        category: Option<CategoryArg>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search the catalog (name, description, category)
    Search {
        query: Option<String>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show details of one framework
    Show {
        id: String,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// List installed frameworks
    Installed {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Install a framework into the workspace
    Install {
        id: String,

        /// Replace an existing file without asking
        #[clap(long, conflicts_with_all = ["merge", "on_conflict"])]
        overwrite: bool,

        /// Append to an existing file with conflict markers without asking
        #[clap(long, conflicts_with = "on_conflict")]
        merge: bool,

        /// Back up an existing file first
        #[clap(long)]
        backup: bool,

        /// Answer conflict prompts non-interactively
        #[clap(long, value_enum)]
        on_conflict: Option<ConflictPolicy>,
    },

    /// Update installed frameworks to the catalog version
    Update {
        /// Framework id (updates everything outdated if omitted)
        id: Option<String>,

        /// Show what would be updated without making changes
        #[clap(long)]
        dry_run: bool,

        /// Accept update prompts (customized files are always backed up)
        #[clap(long, short)]
        yes: bool,
    },

    /// Show installed frameworks with a newer catalog version
    Outdated {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Remove an installed framework
    Remove { id: String },

    /// Flag an installed framework as hand-edited
    MarkCustomized { id: String },

    /// Re-detect which installed frameworks differ from their source
    SyncCustomized,

    /// List backups of an installed framework
    Backups { id: String },
}

impl FrameworkCommand {
    pub async fn execute(self, manager: &LifecycleManager) -> Result<()> {
        match self {
            FrameworkCommand::List { category, json } => {
                execute_list(manager, category.map(Category::from), json).await
            }
            FrameworkCommand::Search { query, json } => {
                execute_search(manager, query.as_deref().unwrap_or(""), json).await
            }
            FrameworkCommand::Show { id, json } => execute_show(manager, &id, json).await,
            FrameworkCommand::Installed { json } => execute_installed(manager, json).await,
            FrameworkCommand::Install {
                id,
                overwrite,
                merge,
                backup,
                on_conflict,
            } => {
                let options = InstallOptions {
                    overwrite,
                    merge,
                    backup,
                };
                execute_install(manager, &id, options, on_conflict).await
            }
            FrameworkCommand::Update { id, dry_run, yes } => {
                execute_update(manager, id.as_deref(), dry_run, yes).await
            }
            FrameworkCommand::Outdated { json } => execute_outdated(manager, json).await,
            FrameworkCommand::Remove { id } => execute_remove(manager, &id).await,
            FrameworkCommand::MarkCustomized { id } => {
                manager.mark_customized(&id).await?;
                println!("Marked '{id}' as customized.");
                Ok(())
            }
            FrameworkCommand::SyncCustomized => execute_sync(manager).await,
            FrameworkCommand::Backups { id } => execute_backups(manager, &id).await,
        }
    }
}

/// Table row for catalog listings
#[derive(Tabled)]
struct FrameworkRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Installed")]
    installed: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn render<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

fn framework_json(framework: &FrameworkDefinition, installed: Option<&InstalledRecord>) -> serde_json::Value {
    serde_json::json!({
        "id": framework.id,
        "name": framework.name,
        "description": framework.description,
        "category": framework.category.as_str(),
        "version": framework.version,
        "fileName": framework.file_name,
        "dependencies": framework.dependencies,
        "installedVersion": installed.map(|r| r.version.clone()),
    })
}

async fn print_frameworks(
    manager: &LifecycleManager,
    frameworks: &[FrameworkDefinition],
    json_output: bool,
) -> Result<()> {
    let installed = manager.get_installed().await?;

    if json_output {
        let results: Vec<_> = frameworks
            .iter()
            .map(|f| framework_json(f, installed.get(&f.id)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if frameworks.is_empty() {
        println!("No frameworks found.");
        return Ok(());
    }

    let rows: Vec<FrameworkRow> = frameworks
        .iter()
        .map(|f| {
            let desc = f.short_description();
            let description = if desc.chars().count() > 50 {
                format!("{}...", desc.chars().take(47).collect::<String>())
            } else {
                desc.to_string()
            };

            FrameworkRow {
                id: f.id.clone(),
                version: format!("v{}", f.version),
                category: f.category.to_string(),
                installed: installed
                    .get(&f.id)
                    .map(|r| format!("v{}", r.version))
                    .unwrap_or_default(),
                description,
            }
        })
        .collect();

    println!("{}", render(&rows));
    Ok(())
}

async fn execute_list(
    manager: &LifecycleManager,
    category: Option<Category>,
    json_output: bool,
) -> Result<()> {
    let frameworks: Vec<FrameworkDefinition> = match category {
        Some(category) => manager
            .catalog()
            .load()
            .await?
            .list_by_category(category)
            .into_iter()
            .cloned()
            .collect(),
        None => manager.list_available().await?,
    };

    print_frameworks(manager, &frameworks, json_output).await
}

async fn execute_search(manager: &LifecycleManager, query: &str, json_output: bool) -> Result<()> {
    let mut results = manager.search(query).await?;
    results.sort_by(|a, b| a.id.cmp(&b.id));

    if !json_output {
        println!("Found {} framework(s):\n", results.len());
    }
    print_frameworks(manager, &results, json_output).await
}

async fn execute_show(manager: &LifecycleManager, id: &str, json_output: bool) -> Result<()> {
    let framework = manager.catalog().require(id).await?;
    let installed = manager.get_installed().await?;
    let record = installed.get(id);

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&framework_json(&framework, record))?
        );
        return Ok(());
    }

    println!("Framework: {} ({})", framework.name, framework.id);
    println!("Version:   v{}", framework.version);
    println!("Category:  {}", framework.category);
    println!("File:      {}", framework.file_name);
    if !framework.dependencies.is_empty() {
        println!("Depends on: {}", framework.dependencies.join(", "));
    }

    println!();
    println!("Description:");
    for line in framework.description.lines() {
        println!("  {line}");
    }

    println!();
    match record {
        Some(record) => {
            println!(
                "Installed v{} on {}",
                record.version,
                record.installed_at.format("%Y-%m-%d")
            );
            if record.customized {
                println!("Customized locally.");
            }
        }
        None => println!("Not installed. Run 'guidekit install {}'", framework.id),
    }

    Ok(())
}

/// Table row for installed frameworks
#[derive(Tabled)]
struct InstalledRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Installed")]
    installed_at: String,
    #[tabled(rename = "Customized")]
    customized: String,
}

async fn execute_installed(manager: &LifecycleManager, json_output: bool) -> Result<()> {
    let state = manager.get_installed().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    if state.is_empty() {
        println!("No frameworks installed.");
        println!("\nRun 'guidekit list' to see available frameworks.");
        return Ok(());
    }

    let rows: Vec<InstalledRow> = state
        .frameworks
        .iter()
        .map(|r| InstalledRow {
            id: r.id.clone(),
            version: format!("v{}", r.version),
            installed_at: r.installed_at.format("%Y-%m-%d").to_string(),
            customized: r
                .customized_at
                .map(|at| format!("yes ({})", at.format("%Y-%m-%d")))
                .unwrap_or_else(|| "no".to_string()),
        })
        .collect();

    println!("{}", render(&rows));
    Ok(())
}

fn provider_for(on_conflict: Option<ConflictPolicy>, accept_updates: bool) -> Box<dyn DecisionProvider> {
    match on_conflict {
        Some(policy) => Box::new(PolicyDecisionProvider {
            on_conflict: policy.into(),
            accept_updates,
        }),
        None if accept_updates => Box::new(PolicyDecisionProvider {
            on_conflict: ConflictChoice::Cancel,
            accept_updates,
        }),
        None => Box::new(PromptDecisionProvider),
    }
}

async fn execute_install(
    manager: &LifecycleManager,
    id: &str,
    options: InstallOptions,
    on_conflict: Option<ConflictPolicy>,
) -> Result<()> {
    let provider = provider_for(on_conflict, false);
    let report = manager
        .install(id, options, provider.as_ref())
        .await
        .with_context(|| format!("Failed to install '{id}'"))?;

    match report.resolution {
        Resolution::Keep => {
            println!("Kept existing {}; nothing installed.", report.target.display());
        }
        Resolution::Merge => {
            println!(
                "Merged {} v{} into {}",
                report.id,
                report.version,
                report.target.display()
            );
            println!("Resolve the <<<<<<< INCOMING block by hand.");
        }
        Resolution::NoConflict | Resolution::Overwrite => {
            println!(
                "Installed {} v{} to {}",
                report.id,
                report.version,
                report.target.display()
            );
        }
    }

    if let Some(backup) = report.backup {
        println!("Backup: {}", backup.display());
    }

    Ok(())
}

/// Table row for outdated frameworks
#[derive(Tabled)]
struct OutdatedRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Status")]
    status: String,
}

async fn execute_outdated(manager: &LifecycleManager, json_output: bool) -> Result<()> {
    let updates = manager.check_for_updates().await?;

    if json_output {
        let results: Vec<_> = updates
            .iter()
            .map(|u| {
                serde_json::json!({
                    "id": u.id,
                    "currentVersion": u.current_version,
                    "latestVersion": u.latest_version,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!("All installed frameworks are up to date.");
        return Ok(());
    }

    let rows: Vec<OutdatedRow> = updates
        .iter()
        .map(|u| OutdatedRow {
            id: u.id.clone(),
            current: format!("v{}", u.current_version),
            latest: format!("v{}", u.latest_version),
            status: if u.is_upgrade() {
                "update available".to_string()
            } else {
                "catalog version is older".to_string()
            },
        })
        .collect();

    println!("{}", render(&rows));
    Ok(())
}

async fn execute_update(
    manager: &LifecycleManager,
    id: Option<&str>,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    if dry_run {
        return execute_outdated(manager, false).await;
    }

    let provider = provider_for(None, yes);

    if let Some(id) = id {
        let report = manager
            .update(id, provider.as_ref())
            .await
            .with_context(|| format!("Failed to update '{id}'"))?;
        println!(
            "Updated {} v{} -> v{}",
            report.id, report.from_version, report.to_version
        );
        if let Some(backup) = report.backup {
            println!("Backup: {}", backup.display());
        }
        return Ok(());
    }

    let summary = manager.update_all(provider.as_ref()).await?;

    for report in &summary.updated {
        println!(
            "Updated {} v{} -> v{}",
            report.id, report.from_version, report.to_version
        );
    }
    for failure in &summary.failed {
        if failure.error.is_cancelled() {
            println!("Skipped {}", failure.id);
        } else {
            println!("Failed {}: {}", failure.id, failure.error);
        }
    }

    println!(
        "\n{} updated, {} not updated.",
        summary.updated.len(),
        summary.failed.len()
    );

    if summary.failed.iter().any(|f| !f.error.is_cancelled()) {
        anyhow::bail!("Some frameworks failed to update");
    }
    Ok(())
}

async fn execute_remove(manager: &LifecycleManager, id: &str) -> Result<()> {
    match manager.remove(id).await? {
        RemoveOutcome::Removed { file_deleted: true } => println!("Removed '{id}'."),
        RemoveOutcome::Removed {
            file_deleted: false,
        } => println!("Removed '{id}' (its file was already gone)."),
        RemoveOutcome::NotInstalled => println!("Framework '{id}' is not installed."),
    }
    Ok(())
}

async fn execute_sync(manager: &LifecycleManager) -> Result<()> {
    let customized = manager.sync_customization_flags().await?;

    if customized.is_empty() {
        println!("No installed framework differs from its source.");
    } else {
        println!("Customized: {}", customized.join(", "));
    }
    Ok(())
}

async fn execute_backups(manager: &LifecycleManager, id: &str) -> Result<()> {
    let backups = manager.list_backups(id).await?;

    if backups.is_empty() {
        println!("No backups for '{id}'.");
        return Ok(());
    }

    for backup in backups {
        println!("{}", backup.display());
    }
    Ok(())
}
