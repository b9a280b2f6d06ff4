use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use service_core::error::AppError;
use tracing::info;

use crate::dtos::check_range;
use crate::dtos::quotation::{
    AddQuotationRequest, GetAllQuotationsRequest, GetAllQuotationsResponse, GetQuotationQuery,
    QuotationCursor, QuotationResponse, UpdateQuotationRequest,
};
use crate::middleware::capabilities;
use crate::models::{project, split_page, validate_select, Quotation};
use crate::services::record_company_operation;
use crate::utils::{ValidatedJson, ValidatedQuery};
use crate::AppState;

/// POST /quotation/get-all-quotations
pub async fn get_all_quotations(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GetAllQuotationsRequest>,
) -> Result<Json<GetAllQuotationsResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, req.company_id, capabilities::QUOTATION_READ)?;
    validate_select::<Quotation>(req.select.as_deref())?;

    let filter = req.query.clone().unwrap_or_default().to_filter();
    check_range(filter.created_between)?;

    let rows = state
        .db
        .list_quotations(req.company_id, req.page_size, &filter, req.cursor.as_ref())
        .await?;
    let (quotations, has_next_page) = split_page(rows, req.page_size);

    let next_page_cursor = quotations.last().map(|q| QuotationCursor {
        quotation_id: q.quotation_id,
        updated_at: q.updated_at,
    });

    Ok(Json(GetAllQuotationsResponse {
        quotations: project(&quotations, req.select.as_deref())?,
        has_next_page,
        next_page_cursor,
    }))
}

/// GET /quotation/get-quotation?quotationId&companyId
pub async fn get_quotation(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetQuotationQuery>,
) -> Result<Json<QuotationResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::QUOTATION_READ)?;

    let (quotation, quotation_items) = state
        .db
        .get_quotation(query.company_id, query.quotation_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("quotation {} not found", query.quotation_id))
        })?;

    Ok(Json(QuotationResponse {
        quotation,
        quotation_items,
        message: None,
    }))
}

/// POST /quotation/add-quotation
pub async fn add_quotation(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AddQuotationRequest>,
) -> Result<(StatusCode, Json<QuotationResponse>), AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.quotation.company_id, capabilities::QUOTATION_WRITE)?;

    let created_at = req.created_at.unwrap_or_else(Utc::now);
    let fields = req.quotation.rounded();

    let (quotation, quotation_items) = state
        .db
        .add_quotation(created_at, req.quotation_number, &fields)
        .await?;

    record_company_operation(ctx.company_id, "add_quotation");
    info!(
        user_id = %ctx.user_id,
        company_id = ctx.company_id,
        quotation_id = quotation.quotation_id,
        "Quotation added"
    );

    Ok((
        StatusCode::CREATED,
        Json(QuotationResponse {
            quotation,
            quotation_items,
            message: Some("quotation added".to_string()),
        }),
    ))
}

/// PUT /quotation/update-quotation
///
/// A quotation that has been converted into a sale can no longer change.
pub async fn update_quotation(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<UpdateQuotationRequest>,
) -> Result<Json<QuotationResponse>, AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.quotation.company_id, capabilities::QUOTATION_WRITE)?;

    let quotation_id = req.quotation_id;
    let fields = req.quotation.rounded();

    let (quotation, quotation_items) = state
        .db
        .update_quotation(quotation_id, &fields)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("quotation {} not found", quotation_id))
        })?;

    record_company_operation(ctx.company_id, "update_quotation");
    info!(user_id = %ctx.user_id, company_id = ctx.company_id, quotation_id, "Quotation updated");

    Ok(Json(QuotationResponse {
        quotation,
        quotation_items,
        message: Some("quotation updated".to_string()),
    }))
}
