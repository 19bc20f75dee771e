//! Gig creation and updates.
//!
//! Updates touch descriptive fields only. Status and assignment are written
//! by the hire coordinator alone.

use crate::entity::{EntityId, UserId};
use crate::error::{CoreError, MarketError, MarketResult};
use crate::market::OpContext;
use crate::model::{Entity, Gig, GigPatch, GigStatus, NewGig};
use crate::store::Precondition;
use tracing::info;

pub(crate) const MAX_TITLE_LEN: usize = 100;
pub(crate) const MAX_DESCRIPTION_LEN: usize = 5000;

pub(crate) fn create_gig(ctx: &OpContext<'_>, owner: &UserId, fields: NewGig) -> MarketResult<Gig> {
    let fields = NewGig {
        title: fields.title.trim().to_string(),
        description: fields.description.trim().to_string(),
        budget: fields.budget,
    };
    validate_text("title", &fields.title, MAX_TITLE_LEN)?;
    validate_text("description", &fields.description, MAX_DESCRIPTION_LEN)?;
    validate_budget(fields.budget)?;

    let gig = Gig::new(owner.clone(), fields);
    let mut txn = ctx.begin()?;
    txn.insert(Entity::Gig(gig.clone()));
    let sequence = txn.commit()?;

    info!(gig = %gig.id, owner = %gig.owner, %sequence, "gig created");
    Ok(gig)
}

pub(crate) fn update_gig(
    ctx: &OpContext<'_>,
    gig_id: EntityId,
    requester: &UserId,
    patch: &GigPatch,
) -> MarketResult<Gig> {
    if patch.is_empty() {
        return Err(MarketError::invalid_input("update changes nothing"));
    }
    let patch = GigPatch {
        title: patch.title.as_deref().map(|t| t.trim().to_string()),
        description: patch.description.as_deref().map(|d| d.trim().to_string()),
        budget: patch.budget,
    };
    ctx.retry_conflicts("update_gig", || attempt_update(ctx, gig_id, requester, &patch))
}

fn attempt_update(
    ctx: &OpContext<'_>,
    gig_id: EntityId,
    requester: &UserId,
    patch: &GigPatch,
) -> MarketResult<Gig> {
    let mut txn = ctx.begin()?;
    let mut gig = txn
        .gig(gig_id)?
        .ok_or_else(|| MarketError::gig_not_found(gig_id))?;

    if gig.owner != *requester {
        return Err(MarketError::Forbidden {
            gig: gig_id,
            requester: requester.clone(),
        });
    }
    if !gig.is_open() {
        return Err(MarketError::GigAlreadyAssigned { gig: gig_id });
    }

    patch.apply_to(&mut gig);
    validate_text("title", &gig.title, MAX_TITLE_LEN)?;
    validate_text("description", &gig.description, MAX_DESCRIPTION_LEN)?;
    validate_budget(gig.budget)?;

    txn.require(Precondition::GigStatus {
        gig: gig_id,
        expected: GigStatus::Open,
    });
    txn.update(Entity::Gig(gig.clone()));

    match txn.commit() {
        Ok(sequence) => {
            info!(gig = %gig_id, %sequence, "gig updated");
            Ok(gig)
        }
        Err(CoreError::PreconditionFailed { gig, .. }) => {
            Err(MarketError::GigAlreadyAssigned { gig })
        }
        Err(err) => Err(err.into()),
    }
}

fn validate_text(field: &str, value: &str, max: usize) -> MarketResult<()> {
    if value.is_empty() {
        return Err(MarketError::invalid_input(format!("{field} must not be empty")));
    }
    let len = value.chars().count();
    if len > max {
        return Err(MarketError::invalid_input(format!(
            "{field} is {len} characters, the limit is {max}"
        )));
    }
    Ok(())
}

fn validate_budget(budget: u64) -> MarketResult<()> {
    if budget == 0 {
        return Err(MarketError::invalid_input("budget must be positive"));
    }
    Ok(())
}
