//! Party handlers: the customers and vendors of a company.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use service_core::error::AppError;
use tracing::info;

use crate::dtos::party::{
    AddPartyRequest, GetAllPartiesRequest, GetAllPartiesResponse, GetPartyQuery, PartyCursor,
    PartyResponse, UpdatePartyRequest,
};
use crate::middleware::capabilities;
use crate::models::{split_page, Party};
use crate::services::record_company_operation;
use crate::utils::{ValidatedJson, ValidatedQuery};
use crate::AppState;

/// POST /party/get-all-parties
pub async fn get_all_parties(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GetAllPartiesRequest>,
) -> Result<Json<GetAllPartiesResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, req.company_id, capabilities::PARTY_READ)?;

    let rows = state
        .db
        .list_parties(req.company_id, req.page_size, &req.filter(), req.cursor.as_ref())
        .await?;
    let (parties, has_next_page) = split_page(rows, req.page_size);

    let next_page_cursor = parties.last().map(|p| PartyCursor {
        party_id: p.party_id,
        updated_at: p.updated_at,
    });

    Ok(Json(GetAllPartiesResponse {
        parties,
        has_next_page,
        next_page_cursor,
    }))
}

/// GET /party/get-party?partyId&companyId
pub async fn get_party(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetPartyQuery>,
) -> Result<Json<Party>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::PARTY_READ)?;

    let party = state
        .db
        .get_party(query.company_id, query.party_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("party {} not found", query.party_id)))?;

    Ok(Json(party))
}

/// POST /party/add-party
pub async fn add_party(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AddPartyRequest>,
) -> Result<(StatusCode, Json<PartyResponse>), AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.company_id, capabilities::PARTY_WRITE)?;

    let party = state.db.create_party(&req.into_input()).await?;

    record_company_operation(ctx.company_id, "add_party");
    info!(
        user_id = %ctx.user_id,
        company_id = ctx.company_id,
        party_id = party.party_id,
        "Party added"
    );

    Ok((
        StatusCode::CREATED,
        Json(PartyResponse {
            party,
            message: "party added".to_string(),
        }),
    ))
}

/// PUT /party/update-party
pub async fn update_party(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<UpdatePartyRequest>,
) -> Result<Json<PartyResponse>, AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.party.company_id, capabilities::PARTY_WRITE)?;

    let party_id = req.party_id;
    let party = state
        .db
        .update_party(party_id, &req.party.into_input())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("party {} not found", party_id)))?;

    record_company_operation(ctx.company_id, "update_party");
    info!(user_id = %ctx.user_id, company_id = ctx.company_id, party_id, "Party updated");

    Ok(Json(PartyResponse {
        party,
        message: "party updated".to_string(),
    }))
}
