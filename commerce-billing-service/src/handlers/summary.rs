//! Dashboard figures: cash flow over a window and this month's best sellers.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::check_range;
use crate::dtos::summary::{GetCashFlowSummaryRequest, TopSellersResponse};
use crate::middleware::capabilities;
use crate::models::CashFlowSummary;
use crate::utils::ValidatedJson;
use crate::AppState;

/// POST /summary/get-cashflow-summary
pub async fn get_cash_flow_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<GetCashFlowSummaryRequest>,
) -> Result<Json<CashFlowSummary>, AppError> {
    state
        .capability_checker
        .require(&headers, req.company_id, capabilities::CASHFLOW_SUMMARY_READ)?;
    check_range(Some((req.from, req.to)))?;

    let summary = state
        .db
        .cash_flow_summary(req.company_id, req.from, req.to)
        .await?;

    Ok(Json(summary))
}

/// GET /summary/get-topsellers-for-current-month/:companyId
pub async fn get_top_sellers_for_current_month(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(company_id): Path<i64>,
) -> Result<Json<TopSellersResponse>, AppError> {
    state
        .capability_checker
        .require(&headers, company_id, capabilities::TOP_SELLERS_READ)?;

    let top_selling_items = state.db.top_sellers_for_month(company_id, Utc::now()).await?;

    Ok(Json(TopSellersResponse { top_selling_items }))
}
