use super::{write_error, Database};
use crate::dtos::party::PartyCursor;
use crate::models::{escape_like, fetch_limit, ListPartiesFilter, Party, PartyInput};
use crate::services::metrics::start_db_timer;
use service_core::error::AppError;
use tracing::{info, instrument};

const PARTY_COLUMNS: &str = "party_id, company_id, party_name, default_sale_credit_allowance_in_days, default_purchase_credit_allowance_in_days, country_id, phone_number, is_active, tax_details, created_at, updated_at";

const DUPLICATE_PARTY: &str = "a party with this name already exists";

impl Database {
    /// One page of a company's parties, most recently updated first.
    #[instrument(skip(self, filter, cursor), fields(company_id = %company_id))]
    pub async fn list_parties(
        &self,
        company_id: i64,
        page_size: i64,
        filter: &ListPartiesFilter,
        cursor: Option<&PartyCursor>,
    ) -> Result<Vec<Party>, AppError> {
        let _timer = start_db_timer("list_parties");

        let name_pattern = filter
            .party_name_search
            .as_deref()
            .map(|s| format!("%{}%", escape_like(s)));

        let sql = format!(
            r#"
            SELECT {PARTY_COLUMNS}
            FROM third_parties
            WHERE company_id = $1
              AND ($2::bool IS NULL OR is_active = $2)
              AND ($3::text IS NULL OR party_name ILIKE $3 ESCAPE '\')
              AND ($4::timestamptz IS NULL OR updated_at < $4 OR (updated_at = $4 AND party_id > $5))
            ORDER BY updated_at DESC, party_id ASC
            LIMIT $6
            "#
        );

        sqlx::query_as::<_, Party>(&sql)
            .bind(company_id)
            .bind(filter.is_active)
            .bind(name_pattern)
            .bind(cursor.map(|c| c.updated_at))
            .bind(cursor.map(|c| c.party_id))
            .bind(fetch_limit(page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list parties: {}", e)))
    }

    #[instrument(skip(self), fields(company_id = %company_id, party_id = %party_id))]
    pub async fn get_party(&self, company_id: i64, party_id: i64) -> Result<Option<Party>, AppError> {
        let _timer = start_db_timer("get_party");

        let sql = format!(
            "SELECT {PARTY_COLUMNS} FROM third_parties WHERE company_id = $1 AND party_id = $2"
        );
        sqlx::query_as::<_, Party>(&sql)
            .bind(company_id)
            .bind(party_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get party: {}", e)))
    }

    /// Insert a party. A name already used in the company (ignoring case) is a 409.
    #[instrument(skip(self, input), fields(company_id = %input.company_id))]
    pub async fn create_party(&self, input: &PartyInput) -> Result<Party, AppError> {
        let _timer = start_db_timer("create_party");

        let sql = format!(
            r#"
            INSERT INTO third_parties (company_id, party_name, default_sale_credit_allowance_in_days, default_purchase_credit_allowance_in_days, country_id, phone_number, is_active, tax_details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PARTY_COLUMNS}
            "#
        );
        let party = sqlx::query_as::<_, Party>(&sql)
            .bind(input.company_id)
            .bind(&input.party_name)
            .bind(input.default_sale_credit_allowance_in_days)
            .bind(input.default_purchase_credit_allowance_in_days)
            .bind(input.country_id)
            .bind(&input.phone_number)
            .bind(input.is_active)
            .bind(&input.tax_details)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error("create party", DUPLICATE_PARTY, e))?;

        info!(party_id = party.party_id, "Party created");
        Ok(party)
    }

    /// Overwrite a party. `None` when it does not exist for the company.
    #[instrument(skip(self, input), fields(company_id = %input.company_id, party_id = %party_id))]
    pub async fn update_party(
        &self,
        party_id: i64,
        input: &PartyInput,
    ) -> Result<Option<Party>, AppError> {
        let _timer = start_db_timer("update_party");

        let sql = format!(
            r#"
            UPDATE third_parties
            SET party_name = $3,
                default_sale_credit_allowance_in_days = $4,
                default_purchase_credit_allowance_in_days = $5,
                country_id = $6,
                phone_number = $7,
                is_active = $8,
                tax_details = $9,
                updated_at = NOW()
            WHERE company_id = $1 AND party_id = $2
            RETURNING {PARTY_COLUMNS}
            "#
        );
        let party = sqlx::query_as::<_, Party>(&sql)
            .bind(input.company_id)
            .bind(party_id)
            .bind(&input.party_name)
            .bind(input.default_sale_credit_allowance_in_days)
            .bind(input.default_purchase_credit_allowance_in_days)
            .bind(input.country_id)
            .bind(&input.phone_number)
            .bind(input.is_active)
            .bind(&input.tax_details)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error("update party", DUPLICATE_PARTY, e))?;

        if party.is_some() {
            info!("Party updated");
        }
        Ok(party)
    }
}
