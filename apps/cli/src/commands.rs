//! Subcommands and their execution against a view state coordinator.

use std::{io::Write, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use client_core::{SaveOutcome, ViewState, ViewStateCoordinator};
use shared::domain::RecordId;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save a new user record.
    Add {
        #[arg(long)]
        name: String,
        /// Age as typed; must be a non-negative integer.
        #[arg(long)]
        age: String,
        /// Photo to store alongside the record.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List records, optionally filtered by name.
    List {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Update an existing record in place.
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete records by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete records by their position in the filtered list.
    DeleteAt {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(required = true)]
        positions: Vec<usize>,
    },
    /// Copy a record's photo to a file.
    ExportImage {
        id: String,
        #[arg(long)]
        out: PathBuf,
    },
}

pub async fn run(
    coordinator: &ViewStateCoordinator,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Add { name, age, image } => {
            if let Some(path) = image {
                coordinator.stage_image(read_image(&path).await?);
            }
            coordinator.set_name(name);
            coordinator.set_age_text(age);
            let outcome = coordinator.save().await?;
            report_save(out, outcome, "saved")?;
        }
        Command::List { search } => {
            coordinator.fetch_all().await;
            coordinator.set_search_text(search);
            print_listing(out, &coordinator.snapshot())?;
        }
        Command::Edit {
            id,
            name,
            age,
            image,
        } => {
            coordinator.fetch_all().await;
            let id = RecordId::from(id);
            if !coordinator.begin_edit(&id) {
                bail!("no record with id {id}");
            }
            if let Some(name) = name {
                coordinator.set_name(name);
            }
            if let Some(age) = age {
                coordinator.set_age_text(age);
            }
            if let Some(path) = image {
                coordinator.stage_image(read_image(&path).await?);
            }
            let outcome = coordinator.save_edit().await?;
            report_save(out, outcome, "updated")?;
        }
        Command::Delete { ids } => {
            coordinator.fetch_all().await;
            let ids: Vec<RecordId> = ids.into_iter().map(RecordId::from).collect();
            coordinator.delete_by_id(&ids).await;
            writeln!(out, "{} record(s) remain", coordinator.snapshot().users.len())?;
        }
        Command::DeleteAt { search, positions } => {
            coordinator.fetch_all().await;
            coordinator.set_search_text(search);
            coordinator.delete_filtered(&positions).await;
            writeln!(out, "{} record(s) remain", coordinator.snapshot().users.len())?;
        }
        Command::ExportImage { id, out: path } => {
            coordinator.fetch_all().await;
            let id = RecordId::from(id);
            let bytes = coordinator
                .load_image(&id)
                .await
                .ok_or_else(|| anyhow!("record {id} has no readable image"))?;
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(out, "wrote {} bytes to {}", bytes.len(), path.display())?;
        }
    }
    Ok(())
}

async fn read_image(path: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read image {}", path.display()))
}

fn report_save(out: &mut impl Write, outcome: SaveOutcome, verb: &str) -> Result<()> {
    match outcome {
        SaveOutcome::Saved(record) => writeln!(out, "{verb} {}", record.id)?,
        SaveOutcome::Rejected(reason) => writeln!(out, "nothing saved: {reason}")?,
    }
    Ok(())
}

fn print_listing(out: &mut impl Write, state: &ViewState) -> Result<()> {
    for (position, user) in state.filtered_users().into_iter().enumerate() {
        let image = user
            .image_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{position}\t{}\t{}\t{}\t{image}",
            user.id, user.name, user.age
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
