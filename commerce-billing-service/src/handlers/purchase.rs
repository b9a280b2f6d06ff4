//! Purchase invoice handlers. Adding or editing a purchase notifies the
//! inventory service inside the same transaction.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use service_core::error::AppError;
use tracing::info;

use crate::dtos::check_range;
use crate::dtos::purchase::{
    AddPurchaseRequest, GetAllPurchasesRequest, GetAllPurchasesResponse, GetPurchaseQuery,
    PurchaseCursor, PurchaseResponse, UpdatePurchaseRequest,
};
use crate::middleware::capabilities;
use crate::models::{project, split_page, validate_select, Purchase};
use crate::services::record_company_operation;
use crate::utils::{ValidatedJson, ValidatedQuery};
use crate::AppState;

/// POST /purchase/get-all-purchases
pub async fn get_all_purchases(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GetAllPurchasesRequest>,
) -> Result<Json<GetAllPurchasesResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, req.company_id, capabilities::PURCHASE_READ)?;
    validate_select::<Purchase>(req.select.as_deref())?;

    let filter = req.query.clone().unwrap_or_default().to_filter();
    check_range(filter.created_between)?;

    let rows = state
        .db
        .list_purchases(req.company_id, req.page_size, &filter, req.cursor.as_ref())
        .await?;
    let (purchases, has_next_page) = split_page(rows, req.page_size);

    let next_page_cursor = purchases.last().map(|p| PurchaseCursor {
        purchase_id: p.purchase_id,
        updated_at: p.updated_at,
    });

    Ok(Json(GetAllPurchasesResponse {
        purchases: project(&purchases, req.select.as_deref())?,
        has_next_page,
        next_page_cursor,
    }))
}

/// GET /purchase/get-purchase?purchaseId&companyId
pub async fn get_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetPurchaseQuery>,
) -> Result<Json<PurchaseResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::PURCHASE_READ)?;

    let (purchase, purchase_items) = state
        .db
        .get_purchase(query.company_id, query.purchase_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("purchase {} not found", query.purchase_id))
        })?;

    Ok(Json(PurchaseResponse {
        purchase,
        purchase_items,
        message: None,
    }))
}

/// POST /purchase/add-purchase
pub async fn add_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AddPurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.purchase.company_id, capabilities::PURCHASE_WRITE)?;

    let created_at = req.created_at.unwrap_or_else(Utc::now);
    let fields = req.purchase.rounded();

    let (purchase, purchase_items) = state
        .db
        .add_purchase(
            created_at,
            &fields,
            state.inventory.as_ref(),
            ctx.request_id.as_deref(),
        )
        .await?;

    record_company_operation(ctx.company_id, "add_purchase");
    info!(
        user_id = %ctx.user_id,
        company_id = ctx.company_id,
        purchase_id = purchase.purchase_id,
        items = purchase_items.len(),
        "Purchase added"
    );

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            purchase,
            purchase_items,
            message: Some("purchase added".to_string()),
        }),
    ))
}

/// PUT /purchase/update-purchase
pub async fn update_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<UpdatePurchaseRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.purchase.company_id, capabilities::PURCHASE_WRITE)?;

    let purchase_id = req.purchase_id;
    let fields = req.purchase.rounded();

    let (purchase, purchase_items) = state
        .db
        .update_purchase(
            purchase_id,
            &fields,
            state.inventory.as_ref(),
            ctx.request_id.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("purchase {} not found", purchase_id)))?;

    record_company_operation(ctx.company_id, "update_purchase");
    info!(user_id = %ctx.user_id, company_id = ctx.company_id, purchase_id, "Purchase updated");

    Ok(Json(PurchaseResponse {
        purchase,
        purchase_items,
        message: Some("purchase updated".to_string()),
    }))
}
