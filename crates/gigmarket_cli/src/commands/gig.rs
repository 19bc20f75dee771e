//! `gig` subcommands.

use crate::commands::{parse_id, Session};
use crate::money::parse_amount;
use crate::output::{emit, print_gig};
use clap::Subcommand;
use gigmarket_core::{GigFilter, GigPatch, GigStatus, NewGig};

#[derive(Subcommand)]
pub enum GigCommand {
    /// Post a new gig
    Create {
        /// Short title
        #[arg(long)]
        title: String,

        /// Description
        #[arg(long)]
        description: String,

        /// Budget, e.g. 250 or 12.50
        #[arg(long)]
        budget: String,
    },

    /// List gigs, most recent first
    List {
        /// Case-insensitive text to look for in title or description
        #[arg(short, long)]
        search: Option<String>,

        /// Only gigs with this status (open, assigned)
        #[arg(long)]
        status: Option<GigStatus>,

        /// Only gigs you posted
        #[arg(long)]
        mine: bool,
    },

    /// Show one gig
    Show {
        /// Gig ID
        id: String,
    },

    /// Change the descriptive fields of an open gig you own
    Update {
        /// Gig ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New budget
        #[arg(long)]
        budget: Option<String>,
    },
}

pub fn run(session: &Session, command: GigCommand) -> Result<(), Box<dyn std::error::Error>> {
    let market = &session.market;
    match command {
        GigCommand::Create {
            title,
            description,
            budget,
        } => {
            let owner = session.user("create a gig")?;
            let fields = NewGig::new(title, description, parse_amount(&budget)?);
            let gig = market.create_gig_within(owner, fields, session.timeout)?;
            emit(session.format, &gig, print_gig)?;
        }
        GigCommand::List {
            search,
            status,
            mine,
        } => {
            let owner = if mine {
                Some(session.user("list your gigs")?.clone())
            } else {
                None
            };
            let filter = GigFilter {
                search,
                status,
                owner,
            };
            let gigs = market.list_gigs_within(&filter, session.timeout)?;
            emit(session.format, &gigs, |gigs| {
                if gigs.is_empty() {
                    println!("No gigs found");
                }
                gigs.iter().for_each(print_gig);
            })?;
        }
        GigCommand::Show { id } => {
            let gig = market.get_gig_within(parse_id(&id)?, session.timeout)?;
            emit(session.format, &gig, print_gig)?;
        }
        GigCommand::Update {
            id,
            title,
            description,
            budget,
        } => {
            let requester = session.user("update a gig")?;
            let patch = GigPatch {
                title,
                description,
                budget: budget.as_deref().map(parse_amount).transpose()?,
            };
            let gig = market.update_gig_within(parse_id(&id)?, requester, patch, session.timeout)?;
            emit(session.format, &gig, print_gig)?;
        }
    }
    Ok(())
}
