mod common;

use common::{purchase_body, purchase_item, sale_body, sale_item, TestApp, OTHER_COMPANY_ID, TEST_COMPANY_ID};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn summary(app: &TestApp, company_id: i64, from: &str, to: &str) -> Value {
    let response = app
        .post(
            "/summary/get-cashflow-summary",
            &json!({ "companyId": company_id, "from": from, "to": to }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_cash_flow_summary() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let vendor = app.add_party(TEST_COMPANY_ID, "Vendor").await;
    let customer = app.add_party(TEST_COMPANY_ID, "Customer").await;

    // Purchase on 2024-05-10 paying 50, still owing 50 by 2024-05-20.
    let mut purchase = purchase_body(TEST_COMPANY_ID, vendor, 1, "50", vec![]);
    purchase["amountDue"] = json!("50");
    assert_eq!(app.post("/purchase/add-purchase", &purchase).await.status().as_u16(), 201);

    // Sale on 2024-05-10 collecting 80, 120 due by 2024-05-25.
    let mut sale = sale_body(TEST_COMPANY_ID, customer, "80", vec![]);
    sale["amountDue"] = json!("120");
    assert_eq!(app.post("/sale/add-sale", &sale).await.status().as_u16(), 201);

    let may = summary(&app, TEST_COMPANY_ID, "2024-05-01 00:00:00", "2024-05-31 23:59:59").await;
    assert_eq!(decimal(&may["cashIn"]), dec!(80));
    assert_eq!(decimal(&may["cashOut"]), dec!(50));
    assert_eq!(decimal(&may["collectionsDue"]), dec!(120));
    assert_eq!(decimal(&may["paymentsDue"]), dec!(50));

    // Before anything fell due, and before any cash moved.
    let early = summary(&app, TEST_COMPANY_ID, "2024-04-01 00:00:00", "2024-05-09 00:00:00").await;
    assert_eq!(decimal(&early["cashIn"]), Decimal::ZERO);
    assert_eq!(decimal(&early["paymentsDue"]), Decimal::ZERO);
    assert_eq!(decimal(&early["collectionsDue"]), Decimal::ZERO);

    // Only the purchase is due by the 21st.
    let mid = summary(&app, TEST_COMPANY_ID, "2024-05-01 00:00:00", "2024-05-21 00:00:00").await;
    assert_eq!(decimal(&mid["paymentsDue"]), dec!(50));
    assert_eq!(decimal(&mid["collectionsDue"]), Decimal::ZERO);

    let other = summary(&app, OTHER_COMPANY_ID, "2024-05-01 00:00:00", "2024-05-31 23:59:59").await;
    assert_eq!(decimal(&other["cashIn"]), Decimal::ZERO);
    assert_eq!(decimal(&other["cashOut"]), Decimal::ZERO);

    app.cleanup().await;
}

#[tokio::test]
async fn test_payment_changes_adjust_cash_flow() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let vendor = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let body = purchase_body(TEST_COMPANY_ID, vendor, 1, "40", vec![purchase_item(1, "1", "1")]);
    let created: Value = app.post("/purchase/add-purchase", &body).await.json().await.unwrap();

    let mut update = body.clone();
    update["purchaseId"] = created["purchase"]["purchaseId"].clone();
    update["amountPaid"] = json!("100");
    update["isFullyPaid"] = json!(true);
    assert_eq!(app.put("/purchase/update-purchase", &update).await.status().as_u16(), 200);

    // The top-up is journalled when the update happens, which is now.
    let all_time = summary(&app, TEST_COMPANY_ID, "2000-01-01 00:00:00", "2100-01-01 00:00:00").await;
    assert_eq!(decimal(&all_time["cashOut"]), dec!(100));
    assert_eq!(decimal(&all_time["paymentsDue"]), Decimal::ZERO);

    app.cleanup().await;
}

#[tokio::test]
async fn test_top_sellers_for_current_month() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let customer = app.add_party(TEST_COMPANY_ID, "Customer").await;

    let sales = [
        vec![sale_item(1, "2", "10"), sale_item(2, "5", "1")],
        vec![sale_item(1, "4", "10"), sale_item(3, "1", "99")],
    ];
    for items in sales {
        let mut body = sale_body(TEST_COMPANY_ID, customer, "0", items);
        body.as_object_mut().unwrap().remove("createdAt");
        assert_eq!(app.post("/sale/add-sale", &body).await.status().as_u16(), 201);
    }
    // A sale from an earlier month does not count.
    let old = sale_body(TEST_COMPANY_ID, customer, "0", vec![sale_item(3, "100", "1")]);
    assert_eq!(app.post("/sale/add-sale", &old).await.status().as_u16(), 201);

    let response = app
        .get(&format!("/summary/get-topsellers-for-current-month/{}", TEST_COMPANY_ID))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let items = body["topSellingItems"].as_array().unwrap();
    let ranking: Vec<(i64, Decimal)> = items
        .iter()
        .map(|i| (i["itemId"].as_i64().unwrap(), decimal(&i["totalUnitsSold"])))
        .collect();
    assert_eq!(ranking, vec![(1, dec!(6)), (2, dec!(5)), (3, dec!(1))]);

    app.cleanup().await;
}
