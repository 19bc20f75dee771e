//! `stats` command.

use crate::commands::Session;
use crate::output::emit;

pub fn run(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let stats = session.market.stats()?;
    emit(session.format, &stats, |s| {
        println!("Gigs:  {} ({} open, {} assigned)", s.gigs, s.open_gigs, s.assigned_gigs);
        println!(
            "Bids:  {} ({} pending, {} hired, {} rejected)",
            s.bids, s.pending_bids, s.hired_bids, s.rejected_bids
        );
        println!("Last commit: seq:{}", s.committed_seq);
        println!("Log size:    {} bytes", s.log_bytes);
    })?;
    Ok(())
}
