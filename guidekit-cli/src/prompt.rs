//! Decision providers for the command line
//!
//! `PromptDecisionProvider` asks on the terminal; `PolicyDecisionProvider`
//! answers from flags so commands can run unattended.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io::{BufRead, Write};

use guidekit_core::lifecycle::{ConflictChoice, ConflictPrompt, UpdateChoice, UpdatePrompt};
use guidekit_core::{DecisionProvider, FrameworkError, Result};

/// Interactive provider reading answers from stdin
pub struct PromptDecisionProvider;

impl PromptDecisionProvider {
    /// Ask until one of `options` (matched by first letter or full word) is given
    async fn ask(id: &str, question: String, options: &'static [&'static str]) -> Result<String> {
        let id_owned = id.to_string();
        tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            loop {
                eprint!("{question} [{}]: ", options.join("/"));
                std::io::stderr().flush().ok();

                let mut line = String::new();
                let read = stdin.lock().read_line(&mut line).map_err(|e| {
                    FrameworkError::ConflictUnresolved {
                        id: id_owned.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if read == 0 {
                    return Err(FrameworkError::ConflictUnresolved {
                        id: id_owned,
                        reason: "no answer (stdin closed)".to_string(),
                    });
                }

                let answer = line.trim().to_lowercase();
                if let Some(option) = options
                    .iter()
                    .find(|o| **o == answer || (answer.len() == 1 && o.starts_with(&answer)))
                {
                    return Ok(option.to_string());
                }
                eprintln!("Please answer one of: {}", options.join(", "));
            }
        })
        .await
        .map_err(|e| FrameworkError::ConflictUnresolved {
            id: id.to_string(),
            reason: e.to_string(),
        })?
    }
}

#[async_trait]
impl DecisionProvider for PromptDecisionProvider {
    async fn resolve_conflict(&self, prompt: &ConflictPrompt) -> Result<ConflictChoice> {
        let question = format!(
            "{} already exists for '{}'. Overwrite, merge, keep or cancel?",
            prompt.target.display(),
            prompt.name
        );
        let answer = Self::ask(&prompt.id, question, &["overwrite", "merge", "keep", "cancel"]).await?;

        Ok(match answer.as_str() {
            "overwrite" => ConflictChoice::Overwrite,
            "merge" => ConflictChoice::Merge,
            "keep" => ConflictChoice::Keep,
            _ => ConflictChoice::Cancel,
        })
    }

    async fn confirm_update(&self, prompt: &UpdatePrompt) -> Result<UpdateChoice> {
        if prompt.customized {
            let question = format!(
                "WARNING: '{}' has local changes. Update v{} -> v{} (a backup is made first)?",
                prompt.name, prompt.current_version, prompt.latest_version
            );
            let answer = Self::ask(&prompt.id, question, &["diff", "update", "cancel"]).await?;
            Ok(match answer.as_str() {
                "diff" => UpdateChoice::ShowDiff,
                "update" => UpdateChoice::UpdateWithBackup,
                _ => UpdateChoice::Cancel,
            })
        } else {
            let question = format!(
                "Update '{}' v{} -> v{}?",
                prompt.name, prompt.current_version, prompt.latest_version
            );
            let answer = Self::ask(&prompt.id, question, &["diff", "update", "cancel"]).await?;
            Ok(match answer.as_str() {
                "diff" => UpdateChoice::ShowDiff,
                "update" => UpdateChoice::Update,
                _ => UpdateChoice::Cancel,
            })
        }
    }

    async fn show_diff(&self, prompt: &UpdatePrompt) -> Result<()> {
        let installed = tokio::fs::read_to_string(&prompt.target)
            .await
            .unwrap_or_default();
        let source = tokio::fs::read_to_string(&prompt.source)
            .await
            .map_err(|e| FrameworkError::io(&prompt.source, e))?;

        eprintln!("--- {} (installed)", prompt.target.display());
        eprintln!("+++ {} (v{})", prompt.source.display(), prompt.latest_version);
        for line in line_diff(&installed, &source) {
            eprintln!("{line}");
        }
        Ok(())
    }
}

/// Lines only in `installed` prefixed with `-`, lines only in `source` with `+`
fn line_diff(installed: &str, source: &str) -> Vec<String> {
    let installed_lines: HashSet<&str> = installed.lines().collect();
    let source_lines: HashSet<&str> = source.lines().collect();

    let removed = installed
        .lines()
        .filter(|l| !source_lines.contains(l))
        .map(|l| format!("-{l}"));
    let added = source
        .lines()
        .filter(|l| !installed_lines.contains(l))
        .map(|l| format!("+{l}"));

    removed.chain(added).collect()
}

/// Non-interactive provider driven by command-line flags
pub struct PolicyDecisionProvider {
    pub on_conflict: ConflictChoice,
    pub accept_updates: bool,
}

#[async_trait]
impl DecisionProvider for PolicyDecisionProvider {
    async fn resolve_conflict(&self, _prompt: &ConflictPrompt) -> Result<ConflictChoice> {
        Ok(self.on_conflict)
    }

    async fn confirm_update(&self, prompt: &UpdatePrompt) -> Result<UpdateChoice> {
        Ok(match (self.accept_updates, prompt.customized) {
            (false, _) => UpdateChoice::Cancel,
            (true, true) => UpdateChoice::UpdateWithBackup,
            (true, false) => UpdateChoice::Update,
        })
    }
}
