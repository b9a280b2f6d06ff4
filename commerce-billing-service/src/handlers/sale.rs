//! Sale invoice handlers.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use service_core::error::AppError;
use tracing::info;

use crate::dtos::check_range;
use crate::dtos::sale::{
    AddSaleRequest, GetAllSalesRequest, GetAllSalesResponse, GetSaleQuery, SaleCursor,
    SaleResponse, UpdateSaleRequest,
};
use crate::middleware::capabilities;
use crate::models::{project, split_page, validate_select, Sale};
use crate::services::record_company_operation;
use crate::utils::{ValidatedJson, ValidatedQuery};
use crate::AppState;

/// POST /sale/get-all-sales
pub async fn get_all_sales(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GetAllSalesRequest>,
) -> Result<Json<GetAllSalesResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, req.company_id, capabilities::SALE_READ)?;
    validate_select::<Sale>(req.select.as_deref())?;

    let filter = req.query.clone().unwrap_or_default().to_filter();
    check_range(filter.created_between)?;

    let rows = state
        .db
        .list_sales(req.company_id, req.page_size, &filter, req.cursor.as_ref())
        .await?;
    let (sales, has_next_page) = split_page(rows, req.page_size);

    let next_page_cursor = sales.last().map(|s| SaleCursor {
        sale_id: s.sale_id,
        updated_at: s.updated_at,
    });

    Ok(Json(GetAllSalesResponse {
        sales: project(&sales, req.select.as_deref())?,
        has_next_page,
        next_page_cursor,
    }))
}

/// GET /sale/get-sale?saleId&companyId
pub async fn get_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<GetSaleQuery>,
) -> Result<Json<SaleResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, query.company_id, capabilities::SALE_READ)?;

    let (sale, sale_items) = state
        .db
        .get_sale(query.company_id, query.sale_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("sale {} not found", query.sale_id)))?;

    Ok(Json(SaleResponse {
        sale,
        sale_items,
        message: None,
    }))
}

/// POST /sale/add-sale
///
/// When `quotationNumber` is given the quotation is marked as converted in the
/// same transaction.
pub async fn add_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<AddSaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.sale.company_id, capabilities::SALE_WRITE)?;

    let created_at = req.created_at.unwrap_or_else(Utc::now);
    let fields = req.sale.rounded();

    let (sale, sale_items) = state
        .db
        .add_sale(
            created_at,
            req.quotation_number,
            &fields,
            state.inventory.as_ref(),
            ctx.request_id.as_deref(),
        )
        .await?;

    record_company_operation(ctx.company_id, "add_sale");
    info!(
        user_id = %ctx.user_id,
        company_id = ctx.company_id,
        sale_id = sale.sale_id,
        invoice_number = sale.invoice_number,
        "Sale added"
    );

    Ok((
        StatusCode::CREATED,
        Json(SaleResponse {
            sale,
            sale_items,
            message: Some("sale added".to_string()),
        }),
    ))
}

/// PUT /sale/update-sale
pub async fn update_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<UpdateSaleRequest>,
) -> Result<Json<SaleResponse>, AppError> {
    let ctx = state
        .capability_checker
        .require(&headers, req.sale.company_id, capabilities::SALE_WRITE)?;

    let sale_id = req.sale_id;
    let fields = req.sale.rounded();

    let (sale, sale_items) = state
        .db
        .update_sale(
            sale_id,
            &fields,
            state.inventory.as_ref(),
            ctx.request_id.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("sale {} not found", sale_id)))?;

    record_company_operation(ctx.company_id, "update_sale");
    info!(user_id = %ctx.user_id, company_id = ctx.company_id, sale_id, "Sale updated");

    Ok(Json(SaleResponse {
        sale,
        sale_items,
        message: Some("sale updated".to_string()),
    }))
}
