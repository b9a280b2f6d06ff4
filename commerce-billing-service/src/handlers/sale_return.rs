//! Sale return handlers. A refund given back to the customer (`cashOut`)
//! is journalled as cash leaving the business.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use service_core::error::AppError;
use tracing::info;

use crate::dtos::check_range;
use crate::dtos::sale_return::{
    AddSaleReturnRequest, GetAllSaleReturnsRequest, GetAllSaleReturnsResponse,
    GetSaleReturnQuery, GetSaleReturnsOfSaleQuery, SaleReturnCursor,
    SaleReturnResponse, SaleReturnsOfSaleResponse,
};
use crate::middleware::capabilities;
use crate::models::{project, split_page, validate_select, SaleReturn};
use crate::services::record_company_operation;
use crate::utils::{ValidatedJson, ValidatedQuery};
use crate::AppState;

/// POST /sale-return/get-all-sale-returns
pub async fn get_all_sale_returns(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GetAllSaleReturnsRequest>,
) -> Result<Json<GetAllSaleReturnsResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, req.company_id, capabilities::SALE_RETURN_READ)?;
    validate_select::<SaleReturn>(req.select.as_deref())?;

    let filter = req.query.clone().unwrap_or_default().to_filter();
    check_range(filter.created_between)?;

    let rows = state
        .db
        .list_sale_returns(req.company_id, req.page_size, &filter, req.cursor.as_ref())
        .await?;
    let (sale_returns, has_next_page) = split_page(rows, req.page_size);

    let next_page_cursor = sale_returns.last().map(|r| SaleReturnCursor {
        sale_return_id: r.sale_return_id,
        created_at: r.created_at,
    });

    Ok(Json(GetAllSaleReturnsResponse {
        sale_returns: project(&sale_returns, req.select.as_deref())?,
        has_next_page,
        next_page_cursor,
    }))
}

/// GET /sale-return/get-sale-return?saleReturnId&companyId
pub async fn get_sale_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetSaleReturnQuery>,
) -> Result<Json<SaleReturnResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::SALE_RETURN_READ)?;

    let (sale_return, sale_return_items) = state
        .db
        .get_sale_return(query.company_id, query.sale_return_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "sale return {} not found",
                query.sale_return_id
            ))
        })?;

    Ok(Json(SaleReturnResponse {
        sale_return,
        sale_return_items,
    }))
}

/// GET /sale-return/get-sale-returns-of-sale?saleId&companyId
pub async fn get_sale_returns_of_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetSaleReturnsOfSaleQuery>,
) -> Result<Json<SaleReturnsOfSaleResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::SALE_RETURN_READ)?;

    let sale_returns = state
        .db
        .get_sale_returns_of_sale(query.company_id, query.sale_id)
        .await?
        .into_iter()
        .map(|(sale_return, sale_return_items)| SaleReturnResponse {
            sale_return,
            sale_return_items,
        })
        .collect();

    Ok(Json(SaleReturnsOfSaleResponse { sale_returns }))
}

/// POST /sale-return/add-sale-return
pub async fn add_sale_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AddSaleReturnRequest>,
) -> Result<(StatusCode, Json<SaleReturnResponse>), AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.company_id, capabilities::SALE_RETURN_WRITE)?;

    let created_at = req.created_at.unwrap_or_else(Utc::now);
    let req = req.rounded();

    let (sale_return, sale_return_items) =
        state.db.add_sale_return(created_at, &req).await?;

    record_company_operation(ctx.company_id, "add_sale_return");
    info!(
        user_id = %ctx.user_id,
        company_id = ctx.company_id,
        sale_id = req.sale_id,
        sale_return_id = sale_return.sale_return_id,
        cash_out = %req.cash_out,
        "Sale return added"
    );

    Ok((
        StatusCode::CREATED,
        Json(SaleReturnResponse {
            sale_return,
            sale_return_items,
        }),
    ))
}
