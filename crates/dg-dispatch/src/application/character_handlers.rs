//! Handlers for game-level character events: movement, the fragment
//! economy, reveals, buffs, and communication between patients.

use dg_character::domain::communication::CommunicationRequest;
use dg_character::domain::economy::{Buff, BuffType, ColorFragment};
use dg_core::error::DomainError;
use dg_rules::DiceExpression;
use serde_json::json;
use uuid::Uuid;

use super::context::{EventContext, Outcome};
use super::session_handlers::resolve_scope;
use crate::domain::events::{
    ArchiveUnlock, BuffApply, CommAccept, CommRequest, CommResolve, FragmentGrant,
    FragmentRedeem, Move, OriginField, OriginUnlock,
};

/// `move`.
pub(crate) async fn move_patient(
    ctx: &mut EventContext<'_>,
    payload: Move,
) -> Result<Outcome, DomainError> {
    ctx.game.ensure_not_ended("move in")?;
    let mut patient = ctx.load_patient(payload.patient_id).await?;
    ctx.require_owner_or_dm(&patient)?;
    let scope = resolve_scope(ctx, payload.region_id, payload.location_id).await?;
    patient.move_to(scope.region_id(), scope.location_id());
    ctx.uow.update_patient(&patient).await?;
    Ok(Outcome::new(json!({
        "patient_id": patient.id,
        "region_id": patient.current_region_id,
        "location_id": patient.current_location_id,
    })))
}

/// `fragment_grant`.
pub(crate) async fn fragment_grant(
    ctx: &mut EventContext<'_>,
    payload: FragmentGrant,
) -> Result<Outcome, DomainError> {
    ctx.game.ensure_not_ended("grant fragments in")?;
    let ghost = ctx.load_ghost(payload.ghost_id).await?;
    let fragment = ColorFragment::mint(
        Uuid::new_v4(),
        ctx.game.id,
        ghost.id,
        payload.color,
        payload.value,
    )?;
    ctx.uow.insert_fragment(&fragment).await?;
    Ok(Outcome::new(json!({
        "fragment_id": fragment.id,
        "ghost_id": ghost.id,
        "color": fragment.color,
        "value": fragment.value,
    })))
}

/// `fragment_redeem`: write-once.
pub(crate) async fn fragment_redeem(
    ctx: &mut EventContext<'_>,
    payload: FragmentRedeem,
) -> Result<Outcome, DomainError> {
    ctx.game.ensure_not_ended("redeem fragments in")?;
    let game_id = ctx.game.id;
    let mut fragment = ctx
        .uow
        .find_fragment(payload.fragment_id)
        .await?
        .filter(|f| f.game_id == game_id)
        .ok_or_else(|| DomainError::not_found("color_fragment", payload.fragment_id))?;
    let holder = ctx.load_ghost(fragment.holder_ghost_id).await?;
    ctx.require_ghost_controller(&holder).await?;
    fragment.redeem(ctx.now)?;
    ctx.uow.update_fragment(&fragment).await?;
    Ok(Outcome::new(json!({
        "fragment_id": fragment.id,
        "ghost_id": holder.id,
        "color": fragment.color,
        "value": fragment.value,
        "redeemed": fragment.redeemed,
    })))
}

/// `archive_unlock`. Unlocking twice is a no-op.
pub(crate) async fn archive_unlock(
    ctx: &mut EventContext<'_>,
    payload: ArchiveUnlock,
) -> Result<Outcome, DomainError> {
    let mut ghost = ctx.load_ghost(payload.ghost_id).await?;
    let changed = ghost.unlock_archive(payload.color);
    if changed {
        ctx.uow.save_ghost(&ghost).await?;
    }
    Ok(Outcome::new(json!({
        "ghost_id": ghost.id,
        "color": payload.color,
        "unlocked": true,
        "changed": changed,
    })))
}

/// `origin_unlock`. Unlocking twice is a no-op.
pub(crate) async fn origin_unlock(
    ctx: &mut EventContext<'_>,
    payload: OriginUnlock,
) -> Result<Outcome, DomainError> {
    let mut ghost = ctx.load_ghost(payload.ghost_id).await?;
    let changed = match payload.field {
        OriginField::Name => ghost.unlock_origin_name(),
        OriginField::Identity => ghost.unlock_origin_identity(),
    };
    if changed {
        ctx.uow.save_ghost(&ghost).await?;
    }
    Ok(Outcome::new(json!({
        "ghost_id": ghost.id,
        "field": payload.field,
        "unlocked": true,
        "changed": changed,
    })))
}

/// `buff_apply`.
pub(crate) async fn buff_apply(
    ctx: &mut EventContext<'_>,
    payload: BuffApply,
) -> Result<Outcome, DomainError> {
    ctx.game.ensure_not_ended("apply buffs in")?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("buff name must not be empty".to_owned()));
    }
    if payload.remaining_rounds < 1 {
        return Err(DomainError::Validation(format!(
            "remaining_rounds must be at least 1 (got {})",
            payload.remaining_rounds
        )));
    }
    let expression = match payload.buff_type {
        BuffType::Dice => DiceExpression::parse(&payload.expression)?.to_string(),
        BuffType::Numeric => {
            payload.expression.trim().parse::<i32>().map_err(|_| {
                DomainError::Validation(format!(
                    "numeric buff expression must be an integer (got {:?})",
                    payload.expression
                ))
            })?;
            payload.expression.trim().to_owned()
        }
        BuffType::Attribute | BuffType::Text => payload.expression.trim().to_owned(),
    };

    let mut ghost = ctx.load_ghost(payload.ghost_id).await?;
    let buff = Buff {
        id: Uuid::new_v4(),
        ghost_id: ghost.id,
        game_id: ctx.game.id,
        name: name.to_owned(),
        expression,
        buff_type: payload.buff_type,
        remaining_rounds: payload.remaining_rounds,
        created_by: Some(ctx.actor_id),
        created_at: ctx.now,
    };
    ghost.add_buff(buff.clone());
    ctx.uow.save_ghost(&ghost).await?;
    Ok(Outcome::new(json!({
        "buff_id": buff.id,
        "ghost_id": ghost.id,
        "name": buff.name,
        "expression": buff.expression,
        "buff_type": buff.buff_type,
        "remaining_rounds": buff.remaining_rounds,
    })))
}

/// `comm_request`: at most one pending request per pair of patients.
pub(crate) async fn comm_request(
    ctx: &mut EventContext<'_>,
    payload: CommRequest,
) -> Result<Outcome, DomainError> {
    ctx.game.ensure_not_ended("communicate in")?;
    let initiator = ctx.load_patient(payload.initiator_patient_id).await?;
    ctx.require_owner_or_dm(&initiator)?;
    let target = ctx.load_patient(payload.target_patient_id).await?;
    if let Some(pending) = ctx.uow.pending_comm_between(initiator.id, target.id).await? {
        return Err(DomainError::Conflict(format!(
            "communication request {} is already pending between these patients",
            pending.id
        )));
    }
    let request =
        CommunicationRequest::open(Uuid::new_v4(), ctx.game.id, initiator.id, target.id, ctx.now)?;
    ctx.uow.insert_comm_request(&request).await?;
    Ok(comm_status(&request))
}

async fn load_request(
    ctx: &mut EventContext<'_>,
    request_id: Uuid,
) -> Result<CommunicationRequest, DomainError> {
    let game_id = ctx.game.id;
    ctx.uow
        .find_comm_request(request_id)
        .await?
        .filter(|r| r.game_id == game_id)
        .ok_or_else(|| DomainError::not_found("communication_request", request_id))
}

/// `comm_accept`: optionally hands one of the target ghost's abilities to
/// the initiator's ghost.
pub(crate) async fn comm_accept(
    ctx: &mut EventContext<'_>,
    payload: CommAccept,
) -> Result<Outcome, DomainError> {
    let mut request = load_request(ctx, payload.request_id).await?;
    let target = ctx.load_patient(request.target_patient_id).await?;
    ctx.require_owner_or_dm(&target)?;
    request.accept(payload.ability_id, ctx.now)?;

    if let Some(ability_id) = payload.ability_id {
        let mut giver = ctx
            .uow
            .find_ghost_by_patient(request.target_patient_id)
            .await?
            .ok_or_else(|| {
                DomainError::Validation("the target patient has no ghost to give from".to_owned())
            })?;
        let mut receiver = ctx
            .uow
            .find_ghost_by_patient(request.initiator_patient_id)
            .await?
            .ok_or_else(|| {
                DomainError::Validation("the initiating patient has no ghost to receive".to_owned())
            })?;
        let ability = giver.release_ability(ability_id)?;
        receiver.receive_ability(ability);
        ctx.uow.save_ghost(&giver).await?;
        ctx.uow.save_ghost(&receiver).await?;
    }

    ctx.uow.update_comm_request(&request).await?;
    let mut outcome = comm_status(&request);
    outcome.data["transferred_ability_id"] = json!(request.transferred_ability_id);
    Ok(outcome)
}

/// `comm_reject`: answered by the target's owner.
pub(crate) async fn comm_reject(
    ctx: &mut EventContext<'_>,
    payload: CommResolve,
) -> Result<Outcome, DomainError> {
    let mut request = load_request(ctx, payload.request_id).await?;
    let target = ctx.load_patient(request.target_patient_id).await?;
    ctx.require_owner_or_dm(&target)?;
    request.reject(ctx.now)?;
    ctx.uow.update_comm_request(&request).await?;
    Ok(comm_status(&request))
}

/// `comm_cancel`: withdrawn by the initiator's owner.
pub(crate) async fn comm_cancel(
    ctx: &mut EventContext<'_>,
    payload: CommResolve,
) -> Result<Outcome, DomainError> {
    let mut request = load_request(ctx, payload.request_id).await?;
    let initiator = ctx.load_patient(request.initiator_patient_id).await?;
    ctx.require_owner_or_dm(&initiator)?;
    request.cancel(ctx.now)?;
    ctx.uow.update_comm_request(&request).await?;
    Ok(comm_status(&request))
}

fn comm_status(request: &CommunicationRequest) -> Outcome {
    Outcome::new(json!({
        "request_id": request.id,
        "initiator_patient_id": request.initiator_patient_id,
        "target_patient_id": request.target_patient_id,
        "status": request.status,
    }))
}
