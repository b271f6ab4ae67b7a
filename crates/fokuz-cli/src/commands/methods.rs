use clap::Subcommand;
use fokuz_core::MethodDraft;

use super::context::Context;

#[derive(Subcommand)]
pub enum MethodsAction {
    /// List built-in and custom methods
    List,
    /// Add a custom method
    Add {
        /// Display name
        name: String,
        /// Work phase length in minutes
        #[arg(long)]
        work: u32,
        /// Break length in minutes (omit or 0 for none)
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Edit a custom method
    Edit {
        /// Method ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        work: Option<u32>,
        /// Break length in minutes (0 removes the break)
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a custom method
    Remove {
        /// Method ID
        id: String,
    },
}

pub fn run(action: MethodsAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open()?;
    let registry = ctx.methods();

    match action {
        MethodsAction::List => {
            println!("{}", serde_json::to_string_pretty(&registry.all()?)?);
        }
        MethodsAction::Add {
            name,
            work,
            break_minutes,
            description,
        } => {
            let method = registry.add(MethodDraft {
                name,
                description,
                work_duration_minutes: work,
                break_duration_minutes: break_minutes,
            })?;
            println!("{}", serde_json::to_string_pretty(&method)?);
        }
        MethodsAction::Edit {
            id,
            name,
            work,
            break_minutes,
            description,
        } => {
            let current = registry
                .get(&id)?
                .filter(|m| m.is_custom())
                .ok_or_else(|| format!("no custom method with id {id}"))?;
            let method = registry.update(
                &id,
                MethodDraft {
                    name: name.unwrap_or(current.name),
                    description: description.unwrap_or(current.description),
                    work_duration_minutes: work.unwrap_or(current.work_duration_minutes),
                    break_duration_minutes: break_minutes.or(current.break_duration_minutes),
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&method)?);
        }
        MethodsAction::Remove { id } => {
            let removed = registry.remove(&id)?;
            println!("{}", serde_json::to_string_pretty(&removed)?);
        }
    }
    Ok(())
}
