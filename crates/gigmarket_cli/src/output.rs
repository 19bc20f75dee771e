//! Text and JSON rendering.

use crate::money::format_amount;
use clap::ValueEnum;
use gigmarket_core::{Bid, Gig};
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Prints `value` as JSON, or runs `text` for the text format.
pub fn emit<T: Serialize>(
    format: Format,
    value: &T,
    text: impl FnOnce(&T),
) -> Result<(), serde_json::Error> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => text(value),
    }
    Ok(())
}

pub fn print_gig(gig: &Gig) {
    println!("{}  [{}]  {}", gig.id, gig.status, gig.title);
    println!("  owner:  {}", gig.owner);
    println!("  budget: {}", format_amount(gig.budget));
    if let Some(assignee) = &gig.assigned_to {
        println!("  assigned to: {assignee}");
    }
    println!("  {}", gig.description);
}

pub fn print_bid(bid: &Bid) {
    println!(
        "{}  [{}]  {} offers {}",
        bid.id,
        bid.status,
        bid.freelancer,
        format_amount(bid.price)
    );
    println!("  gig: {}", bid.gig);
    println!("  {}", bid.message);
}
