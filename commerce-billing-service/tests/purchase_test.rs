mod common;

use common::{purchase_body, purchase_item, TestApp, OTHER_COMPANY_ID, TEST_COMPANY_ID};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_add_purchase_records_stock_and_payment() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let party_id = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let body = purchase_body(
        TEST_COMPANY_ID,
        party_id,
        101,
        "50",
        vec![purchase_item(1, "10", "2.5"), purchase_item(2, "4", "12.125")],
    );
    let response = app.post("/purchase/add-purchase", &body).await;
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["message"], "purchase added");
    assert_eq!(created["purchase"]["invoiceNumber"], 101);
    assert_eq!(decimal(&created["purchase"]["amountPaid"]), dec!(50));
    assert_eq!(created["purchaseItems"].as_array().unwrap().len(), 2);
    let purchase_id = created["purchase"]["purchaseId"].as_i64().unwrap();

    let calls = app.inventory_calls("/item/record-purchase").await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["companyId"], TEST_COMPANY_ID);
    assert_eq!(calls[0]["purchaseId"], purchase_id);
    assert_eq!(calls[0]["items"][0]["itemId"], 1);
    assert_eq!(calls[0]["items"][0]["unitsPurchased"].as_f64(), Some(10.0));
    assert_eq!(calls[0]["items"][1]["pricePerUnit"].as_f64(), Some(12.125));

    let response = app
        .get(&format!(
            "/purchase/get-purchase?purchaseId={}&companyId={}",
            purchase_id, TEST_COMPANY_ID
        ))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["purchaseItems"].as_array().unwrap().len(), 2);
    assert!(fetched.get("message").is_none());

    app.cleanup().await;
}

#[tokio::test]
async fn test_update_purchase_reconciles_items() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let party_id = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let body = purchase_body(
        TEST_COMPANY_ID,
        party_id,
        7,
        "0",
        vec![purchase_item(1, "10", "2"), purchase_item(2, "5", "3")],
    );
    let created: Value = app.post("/purchase/add-purchase", &body).await.json().await.unwrap();
    let purchase_id = created["purchase"]["purchaseId"].as_i64().unwrap();

    // Item 1 changes quantity, item 2 goes away, item 3 is new.
    let mut update = purchase_body(
        TEST_COMPANY_ID,
        party_id,
        7,
        "30",
        vec![purchase_item(1, "12", "2"), purchase_item(3, "1", "9")],
    );
    update["purchaseId"] = json!(purchase_id);
    let response = app.put("/purchase/update-purchase", &update).await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["message"], "purchase updated");
    let item_ids: Vec<i64> = updated["purchaseItems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["itemId"].as_i64().unwrap())
        .collect();
    assert_eq!(item_ids, vec![1, 3]);

    let added = app.inventory_calls("/item/record-purchase").await;
    assert_eq!(added.len(), 2);
    assert_eq!(added[1]["items"].as_array().unwrap().len(), 1);
    assert_eq!(added[1]["items"][0]["itemId"], 3);

    let changed = app.inventory_calls("/item/record-purchase-update").await;
    assert_eq!(changed.len(), 1);
    let items = &changed[0]["items"];
    assert_eq!(items["itemsUpdated"][0]["old"]["unitsPurchased"].as_f64(), Some(10.0));
    assert_eq!(items["itemsUpdated"][0]["new"]["unitsPurchased"].as_f64(), Some(12.0));
    assert_eq!(items["itemsRemoved"][0]["itemId"], 2);

    app.cleanup().await;
}

#[tokio::test]
async fn test_update_without_item_changes_skips_inventory() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let party_id = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let body = purchase_body(TEST_COMPANY_ID, party_id, 8, "0", vec![purchase_item(1, "1", "1")]);
    let created: Value = app.post("/purchase/add-purchase", &body).await.json().await.unwrap();

    let mut update = body.clone();
    update["purchaseId"] = created["purchase"]["purchaseId"].clone();
    update["receiptNumber"] = json!("R-1");
    let response = app.put("/purchase/update-purchase", &update).await;
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(app.inventory_calls("/item/record-purchase").await.len(), 1);
    assert!(app.inventory_calls("/item/record-purchase-update").await.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn test_update_unknown_purchase_is_not_found() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let party_id = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let mut update = purchase_body(TEST_COMPANY_ID, party_id, 1, "0", vec![]);
    update["purchaseId"] = json!(424_242);
    let response = app.put("/purchase/update-purchase", &update).await;
    assert_eq!(response.status().as_u16(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn test_unknown_party_is_unprocessable() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let body = purchase_body(TEST_COMPANY_ID, 999_999, 1, "0", vec![purchase_item(1, "1", "1")]);
    let response = app.post("/purchase/add-purchase", &body).await;
    assert_eq!(response.status().as_u16(), 422);
    assert!(app.inventory_calls("/item/record-purchase").await.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn test_party_of_another_company_is_unprocessable() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let own_vendor = app.add_party(TEST_COMPANY_ID, "Vendor").await;
    let foreign_vendor = app.add_party(OTHER_COMPANY_ID, "Vendor").await;

    let body = purchase_body(TEST_COMPANY_ID, foreign_vendor, 1, "0", vec![purchase_item(1, "1", "1")]);
    let response = app.post("/purchase/add-purchase", &body).await;
    assert_eq!(response.status().as_u16(), 422);
    assert!(app.inventory_calls("/item/record-purchase").await.is_empty());

    let body = purchase_body(TEST_COMPANY_ID, own_vendor, 2, "0", vec![]);
    let created: Value = app.post("/purchase/add-purchase", &body).await.json().await.unwrap();

    let mut update = purchase_body(TEST_COMPANY_ID, foreign_vendor, 2, "0", vec![]);
    update["purchaseId"] = created["purchase"]["purchaseId"].clone();
    let response = app.put("/purchase/update-purchase", &update).await;
    assert_eq!(response.status().as_u16(), 422);

    app.cleanup().await;
}

#[tokio::test]
async fn test_duplicate_item_in_new_purchase_is_unprocessable() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let party_id = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let body = purchase_body(
        TEST_COMPANY_ID,
        party_id,
        9,
        "0",
        vec![purchase_item(4, "1", "1"), purchase_item(4, "2", "1")],
    );
    let response = app.post("/purchase/add-purchase", &body).await;
    assert_eq!(response.status().as_u16(), 422);
    let error: Value = response.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("duplicate itemId 4"));
    assert!(app.inventory_calls("/item/record-purchase").await.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn test_inventory_rejection_rolls_back_purchase() {
    let inventory = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/item/record-purchase"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&inventory)
        .await;
    let Some(app) = TestApp::spawn_with_inventory(inventory).await else {
        return;
    };
    let party_id = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let body = purchase_body(TEST_COMPANY_ID, party_id, 55, "20", vec![purchase_item(1, "1", "1")]);
    let response = app.post("/purchase/add-purchase", &body).await;
    assert_eq!(response.status().as_u16(), 502);

    let response = app
        .post(
            "/purchase/get-all-purchases",
            &json!({ "companyId": TEST_COMPANY_ID, "pageSize": 10 }),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    assert!(body["purchases"].as_array().unwrap().is_empty());

    let cash_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cash_in_out")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(cash_rows, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn test_inventory_rejection_rolls_back_purchase_update() {
    let inventory = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/item/record-purchase"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&inventory)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/item/record-purchase-update"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&inventory)
        .await;
    let Some(app) = TestApp::spawn_with_inventory(inventory).await else {
        return;
    };
    let party_id = app.add_party(TEST_COMPANY_ID, "Vendor").await;

    let body = purchase_body(
        TEST_COMPANY_ID,
        party_id,
        12,
        "10",
        vec![purchase_item(1, "10", "2"), purchase_item(2, "5", "3")],
    );
    let created: Value = app.post("/purchase/add-purchase", &body).await.json().await.unwrap();
    let purchase_id = created["purchase"]["purchaseId"].as_i64().unwrap();

    // Payment, an updated line and a removed line all ride on the failed update call.
    let mut update = purchase_body(TEST_COMPANY_ID, party_id, 12, "40", vec![purchase_item(1, "12", "2")]);
    update["purchaseId"] = json!(purchase_id);
    let response = app.put("/purchase/update-purchase", &update).await;
    assert_eq!(response.status().as_u16(), 502);

    let fetched: Value = app
        .get(&format!(
            "/purchase/get-purchase?purchaseId={}&companyId={}",
            purchase_id, TEST_COMPANY_ID
        ))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&fetched["purchase"]["amountPaid"]), dec!(10));
    assert_eq!(fetched["purchase"]["updatedAt"], created["purchase"]["updatedAt"]);
    let items = fetched["purchaseItems"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(decimal(&items[0]["unitsPurchased"]), dec!(10));

    let cash_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cash_in_out WHERE purchase_id = $1")
        .bind(purchase_id)
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(cash_rows, 1);

    app.cleanup().await;
}

#[tokio::test]
async fn test_list_purchases_filters_projects_and_pages() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let vendor = app.add_party(TEST_COMPANY_ID, "Vendor").await;
    let other_vendor = app.add_party(TEST_COMPANY_ID, "Other Vendor").await;

    for invoice in [1, 2, 3] {
        let body = purchase_body(TEST_COMPANY_ID, vendor, invoice, "0", vec![]);
        assert_eq!(app.post("/purchase/add-purchase", &body).await.status().as_u16(), 201);
    }
    let mut cash = purchase_body(TEST_COMPANY_ID, other_vendor, 4, "100", vec![]);
    cash["isCredit"] = json!(false);
    cash["isFullyPaid"] = json!(true);
    assert_eq!(app.post("/purchase/add-purchase", &cash).await.status().as_u16(), 201);

    let response = app
        .post(
            "/purchase/get-all-purchases",
            &json!({
                "companyId": TEST_COMPANY_ID,
                "pageSize": 2,
                "query": { "partyId": vendor },
                "select": ["invoiceNumber"],
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let first: Value = response.json().await.unwrap();
    let page = first["purchases"].as_array().unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(first["hasNextPage"], true);
    let row = page[0].as_object().unwrap();
    assert_eq!(row.len(), 3);
    assert!(row.contains_key("purchaseId"));
    assert!(row.contains_key("updatedAt"));

    let response = app
        .post(
            "/purchase/get-all-purchases",
            &json!({
                "companyId": TEST_COMPANY_ID,
                "pageSize": 2,
                "query": { "partyId": vendor },
                "cursor": first["nextPageCursor"],
            }),
        )
        .await;
    let second: Value = response.json().await.unwrap();
    assert_eq!(second["purchases"].as_array().unwrap().len(), 1);
    // Same timestamp throughout, so ties fall back to id order.
    assert_eq!(second["purchases"][0]["invoiceNumber"], 3);
    assert_eq!(second["hasNextPage"], false);
    assert!(second.get("nextPageCursor").is_some());

    let response = app
        .post(
            "/purchase/get-all-purchases",
            &json!({
                "companyId": TEST_COMPANY_ID,
                "pageSize": 10,
                "query": { "purchaseType": "CASH" },
            }),
        )
        .await;
    let cash_only: Value = response.json().await.unwrap();
    assert_eq!(cash_only["purchases"].as_array().unwrap().len(), 1);
    assert_eq!(cash_only["purchases"][0]["invoiceNumber"], 4);

    // Every credit purchase is due 2024-05-20, long past.
    let response = app
        .post(
            "/purchase/get-all-purchases",
            &json!({
                "companyId": TEST_COMPANY_ID,
                "pageSize": 10,
                "query": { "getOnlyOverduePayments": true },
            }),
        )
        .await;
    let overdue: Value = response.json().await.unwrap();
    assert_eq!(overdue["purchases"].as_array().unwrap().len(), 3);

    app.cleanup().await;
}
