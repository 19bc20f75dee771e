//! `verify` command.

use crate::commands::Session;
use crate::error::CliError;
use crate::output::emit;
use tracing::info;

pub fn run(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    info!("Verifying marketplace invariants");
    let report = session.market.verify_within(session.timeout)?;

    emit(session.format, &report, |report| {
        println!(
            "Checked {} gig(s) and {} bid(s)",
            report.gigs_checked, report.bids_checked
        );
        for violation in &report.violations {
            println!("  ✗ {violation}");
        }
        if report.is_clean() {
            println!("✓ Marketplace verification passed");
        }
    })?;

    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::IntegrityViolations(report.violations.len()).into())
    }
}
