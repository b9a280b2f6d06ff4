//! Purchase return handlers. Returns are append-only: there is no update.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use service_core::error::AppError;
use tracing::info;

use crate::dtos::check_range;
use crate::dtos::purchase_return::{
    AddPurchaseReturnRequest, GetAllPurchaseReturnsRequest, GetAllPurchaseReturnsResponse,
    GetPurchaseReturnQuery, GetPurchaseReturnsOfPurchaseQuery, PurchaseReturnCursor,
    PurchaseReturnResponse, PurchaseReturnsOfPurchaseResponse,
};
use crate::middleware::capabilities;
use crate::models::{project, split_page, validate_select, PurchaseReturn};
use crate::services::record_company_operation;
use crate::utils::{ValidatedJson, ValidatedQuery};
use crate::AppState;

/// POST /purchase-return/get-all-purchase-returns
pub async fn get_all_purchase_returns(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GetAllPurchaseReturnsRequest>,
) -> Result<Json<GetAllPurchaseReturnsResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, req.company_id, capabilities::PURCHASE_RETURN_READ)?;
    validate_select::<PurchaseReturn>(req.select.as_deref())?;

    let filter = req.query.clone().unwrap_or_default().to_filter();
    check_range(filter.created_between)?;

    let rows = state
        .db
        .list_purchase_returns(req.company_id, req.page_size, &filter, req.cursor.as_ref())
        .await?;
    let (purchase_returns, has_next_page) = split_page(rows, req.page_size);

    let next_page_cursor = purchase_returns.last().map(|r| PurchaseReturnCursor {
        purchase_return_id: r.purchase_return_id,
        created_at: r.created_at,
    });

    Ok(Json(GetAllPurchaseReturnsResponse {
        purchase_returns: project(&purchase_returns, req.select.as_deref())?,
        has_next_page,
        next_page_cursor,
    }))
}

/// GET /purchase-return/get-purchase-return?purchaseReturnId&companyId
pub async fn get_purchase_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetPurchaseReturnQuery>,
) -> Result<Json<PurchaseReturnResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::PURCHASE_RETURN_READ)?;

    let (purchase_return, purchase_return_items) = state
        .db
        .get_purchase_return(query.company_id, query.purchase_return_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "purchase return {} not found",
                query.purchase_return_id
            ))
        })?;

    Ok(Json(PurchaseReturnResponse {
        purchase_return,
        purchase_return_items,
    }))
}

/// GET /purchase-return/get-purchase-returns-of-purchase?purchaseId&companyId
pub async fn get_purchase_returns_of_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetPurchaseReturnsOfPurchaseQuery>,
) -> Result<Json<PurchaseReturnsOfPurchaseResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::PURCHASE_RETURN_READ)?;

    let purchase_returns = state
        .db
        .get_purchase_returns_of_purchase(query.company_id, query.purchase_id)
        .await?
        .into_iter()
        .map(|(purchase_return, purchase_return_items)| PurchaseReturnResponse {
            purchase_return,
            purchase_return_items,
        })
        .collect();

    Ok(Json(PurchaseReturnsOfPurchaseResponse { purchase_returns }))
}

/// POST /purchase-return/add-purchase-return
pub async fn add_purchase_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AddPurchaseReturnRequest>,
) -> Result<(StatusCode, Json<PurchaseReturnResponse>), AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.company_id, capabilities::PURCHASE_RETURN_WRITE)?;

    let created_at = req.created_at.unwrap_or_else(Utc::now);
    let req = req.rounded();

    let (purchase_return, purchase_return_items) =
        state.db.add_purchase_return(created_at, &req).await?;

    record_company_operation(ctx.company_id, "add_purchase_return");
    info!(
        user_id = %ctx.user_id,
        company_id = ctx.company_id,
        purchase_id = req.purchase_id,
        purchase_return_id = purchase_return.purchase_return_id,
        "Purchase return added"
    );

    Ok((
        StatusCode::CREATED,
        Json(PurchaseReturnResponse {
            purchase_return,
            purchase_return_items,
        }),
    ))
}
