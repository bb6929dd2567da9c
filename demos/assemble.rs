//! Assembles a character from model files and prints what happened.
//!
//! ```text
//! cargo run --example assemble -- models/base.glb helmet=parts/helmet.glb shirt=parts/shirt.glb
//! ```
//!
//! Set `RUST_LOG=debug` for loader and rebind details.

use anyhow::{Context, bail};
use loadout::{Character, CharacterConfig, SlotOutcome, SlotStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(base) = args.next() else {
        bail!("usage: assemble <base model> [slot=part ...]");
    };

    let mut character = Character::new(CharacterConfig::default());
    character
        .load_base(&base)
        .await
        .with_context(|| format!("loading base '{base}'"))?;

    if let Some(index) = character.skeleton_index() {
        let mut bones: Vec<_> = index.names().collect();
        bones.sort_unstable();
        println!("base '{base}': {} bones", bones.len());
        println!("  {}", bones.join(", "));
    }

    for arg in args {
        let Some((slot, locator)) = arg.split_once('=') else {
            eprintln!("skipping '{arg}': expected slot=locator");
            continue;
        };

        match character.set_slot(slot, Some(locator)).await {
            Ok(SlotOutcome::Applied(report)) => {
                println!(
                    "{slot} <- {locator}: {} mesh(es), {} skeleton(s) rebound",
                    report.rebound_meshes, report.rebound_skeletons
                );
                for warning in &report.warnings {
                    println!(
                        "  unmatched bone '{}' (mesh '{}', position {})",
                        warning.bone, warning.mesh, warning.position
                    );
                }
                if report.unresolved_influences > 0 {
                    println!("  {} vertices lost a bone", report.unresolved_influences);
                }
            }
            Ok(SlotOutcome::Cleared) => println!("{slot}: cleared"),
            Ok(SlotOutcome::Stale) => println!("{slot}: superseded"),
            Err(err) => eprintln!("{slot}: {err}"),
        }
    }

    println!();
    for (slot, status) in character.slot_statuses() {
        let detail = match status {
            SlotStatus::Occupied => character
                .slot_occupant(slot)?
                .map(|o| o.locator.clone())
                .unwrap_or_default(),
            SlotStatus::Failed => character
                .slots()
                .last_error(slot)?
                .unwrap_or_default()
                .to_string(),
            SlotStatus::Empty | SlotStatus::Loading => String::new(),
        };
        println!("{slot:>10}: {status:?} {detail}");
    }

    if let Some(bounds) = character.bounds() {
        println!(
            "\nbounds: min {:?} max {:?} (size {:?})",
            bounds.min,
            bounds.max,
            bounds.size()
        );
    }

    Ok(())
}
