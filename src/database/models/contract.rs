use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::validation::{double_option, normalize_currency, optional_text, required_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "contract_status", rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Active,
    Expired,
    Terminated,
    Renewed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contract {
    pub id: Uuid,
    pub client_id: Uuid,
    pub contract_name: String,
    pub contract_number: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub renewal_date: Option<NaiveDate>,
    pub value: Decimal,
    pub currency: String,
    pub status: ContractStatus,
    pub document_link: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contract {
    fn validate(&self) -> Result<(), ApiError> {
        if self.end_date < self.start_date {
            return Err(ApiError::invalid_field("end_date", "End date must not be before start date"));
        }
        if self.value < Decimal::ZERO {
            return Err(ApiError::invalid_field("value", "Contract value cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContract {
    pub client_id: Uuid,
    pub contract_name: String,
    pub contract_number: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub renewal_date: Option<NaiveDate>,
    pub value: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<ContractStatus>,
    pub document_link: Option<String>,
    pub notes: Option<String>,
}

impl CreateContract {
    pub fn into_contract(self, now: DateTime<Utc>) -> Result<Contract, ApiError> {
        let contract = Contract {
            id: Uuid::new_v4(),
            client_id: self.client_id,
            contract_name: required_text("contract_name", &self.contract_name, 200)?,
            contract_number: optional_text(self.contract_number),
            start_date: self.start_date,
            end_date: self.end_date,
            renewal_date: self.renewal_date,
            value: self.value.unwrap_or(Decimal::ZERO),
            currency: normalize_currency("currency", self.currency.as_deref().unwrap_or("USD"))?,
            status: self.status.unwrap_or(ContractStatus::Draft),
            document_link: optional_text(self.document_link),
            notes: optional_text(self.notes),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        contract.validate()?;
        Ok(contract)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContract {
    pub contract_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub contract_number: Option<Option<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub renewal_date: Option<Option<NaiveDate>>,
    pub value: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<ContractStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub document_link: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateContract {
    pub fn apply(self, contract: &mut Contract) -> Result<(), ApiError> {
        if let Some(name) = self.contract_name {
            contract.contract_name = required_text("contract_name", &name, 200)?;
        }
        if let Some(v) = self.contract_number {
            contract.contract_number = optional_text(v);
        }
        if let Some(d) = self.start_date {
            contract.start_date = d;
        }
        if let Some(d) = self.end_date {
            contract.end_date = d;
        }
        if let Some(d) = self.renewal_date {
            contract.renewal_date = d;
        }
        if let Some(v) = self.value {
            contract.value = v;
        }
        if let Some(c) = self.currency {
            contract.currency = normalize_currency("currency", &c)?;
        }
        if let Some(s) = self.status {
            contract.status = s;
        }
        if let Some(v) = self.document_link {
            contract.document_link = optional_text(v);
        }
        if let Some(v) = self.notes {
            contract.notes = optional_text(v);
        }
        contract.validate()?;
        contract.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractFilter {
    pub client_id: Option<Uuid>,
    pub status: Option<ContractStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewContract {
    pub end_date: NaiveDate,
    pub value: Option<Decimal>,
    pub contract_name: Option<String>,
    pub contract_number: Option<String>,
}

impl RenewContract {
    /// Builds the successor of `previous`, starting the day after it ends
    pub fn successor(self, previous: &Contract, now: DateTime<Utc>) -> Result<Contract, ApiError> {
        let start_date = previous
            .end_date
            .succ_opt()
            .ok_or_else(|| ApiError::invalid_field("end_date", "Contract end date is out of range"))?;

        if self.end_date < start_date {
            return Err(ApiError::invalid_field(
                "end_date",
                format!("Renewal must end on or after {}", start_date),
            ));
        }

        let contract = Contract {
            id: Uuid::new_v4(),
            client_id: previous.client_id,
            contract_name: match self.contract_name {
                Some(name) => required_text("contract_name", &name, 200)?,
                None => previous.contract_name.clone(),
            },
            contract_number: optional_text(self.contract_number),
            start_date,
            end_date: self.end_date,
            renewal_date: None,
            value: self.value.unwrap_or(previous.value),
            currency: previous.currency.clone(),
            status: ContractStatus::Active,
            document_link: None,
            notes: Some(format!("Renewal of contract {}", previous.id)),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        contract.validate()?;
        Ok(contract)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "saf_status", rename_all = "snake_case")]
pub enum SafStatus {
    NotStarted,
    Pending,
    SentToClient,
    Signed,
    Activated,
}

impl SafStatus {
    pub fn next(&self) -> Option<SafStatus> {
        match self {
            SafStatus::NotStarted => Some(SafStatus::Pending),
            SafStatus::Pending => Some(SafStatus::SentToClient),
            SafStatus::SentToClient => Some(SafStatus::Signed),
            SafStatus::Signed => Some(SafStatus::Activated),
            SafStatus::Activated => None,
        }
    }

    /// Forward one step at a time, or reset to not_started
    pub fn can_transition_to(&self, target: SafStatus) -> bool {
        if *self == target {
            return false;
        }
        target == SafStatus::NotStarted || self.next() == Some(target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceScope {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub service_name: String,
    pub description: Option<String>,
    pub scope_parameters: Value,
    pub price: Option<Decimal>,
    pub saf_status: SafStatus,
    pub saf_document_link: Option<String>,
    pub saf_sent_at: Option<DateTime<Utc>>,
    pub saf_signed_at: Option<DateTime<Utc>>,
    pub saf_activated_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceScope {
    /// Moves the SAF workflow to `target`, stamping or clearing its timestamps
    pub fn transition_saf(&mut self, target: SafStatus, now: DateTime<Utc>) -> Result<(), ApiError> {
        if !self.saf_status.can_transition_to(target) {
            let expected = match self.saf_status.next() {
                Some(next) => format!("expected {:?} or a reset to NotStarted", next),
                None => "only a reset to NotStarted is possible".to_string(),
            };
            return Err(ApiError::bad_request(format!(
                "Cannot move SAF from {:?} to {:?}; {}",
                self.saf_status, target, expected
            )));
        }

        match target {
            SafStatus::NotStarted => {
                self.saf_sent_at = None;
                self.saf_signed_at = None;
                self.saf_activated_at = None;
            }
            SafStatus::Pending => {}
            SafStatus::SentToClient => self.saf_sent_at = Some(now),
            SafStatus::Signed => self.saf_signed_at = Some(now),
            SafStatus::Activated => self.saf_activated_at = Some(now),
        }
        self.saf_status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Copy carried into a renewed contract with the SAF workflow reset
    pub fn renewed_copy(&self, contract_id: Uuid, now: DateTime<Utc>) -> ServiceScope {
        ServiceScope {
            id: Uuid::new_v4(),
            contract_id,
            service_name: self.service_name.clone(),
            description: self.description.clone(),
            scope_parameters: self.scope_parameters.clone(),
            price: self.price,
            saf_status: SafStatus::NotStarted,
            saf_document_link: None,
            saf_sent_at: None,
            saf_signed_at: None,
            saf_activated_at: None,
            notes: self.notes.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

fn validate_scope_parameters(parameters: &Value) -> Result<(), ApiError> {
    if !parameters.is_object() {
        return Err(ApiError::invalid_field("scope_parameters", "Must be a JSON object"));
    }
    Ok(())
}

fn validate_price(price: Option<Decimal>) -> Result<(), ApiError> {
    match price {
        Some(p) if p < Decimal::ZERO => Err(ApiError::invalid_field("price", "Price cannot be negative")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceScope {
    pub service_name: String,
    pub description: Option<String>,
    pub scope_parameters: Option<Value>,
    pub price: Option<Decimal>,
    pub saf_document_link: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl CreateServiceScope {
    pub fn into_scope(self, contract_id: Uuid, now: DateTime<Utc>) -> Result<ServiceScope, ApiError> {
        let scope_parameters = self.scope_parameters.unwrap_or_else(|| Value::Object(Default::default()));
        validate_scope_parameters(&scope_parameters)?;
        validate_price(self.price)?;

        Ok(ServiceScope {
            id: Uuid::new_v4(),
            contract_id,
            service_name: required_text("service_name", &self.service_name, 200)?,
            description: optional_text(self.description),
            scope_parameters,
            price: self.price,
            saf_status: SafStatus::NotStarted,
            saf_document_link: optional_text(self.saf_document_link),
            saf_sent_at: None,
            saf_signed_at: None,
            saf_activated_at: None,
            notes: optional_text(self.notes),
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServiceScope {
    pub service_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub scope_parameters: Option<Value>,
    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub saf_document_link: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl UpdateServiceScope {
    pub fn apply(self, scope: &mut ServiceScope) -> Result<(), ApiError> {
        if let Some(name) = self.service_name {
            scope.service_name = required_text("service_name", &name, 200)?;
        }
        if let Some(v) = self.description {
            scope.description = optional_text(v);
        }
        if let Some(params) = self.scope_parameters {
            validate_scope_parameters(&params)?;
            scope.scope_parameters = params;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
            scope.price = price;
        }
        if let Some(v) = self.saf_document_link {
            scope.saf_document_link = optional_text(v);
        }
        if let Some(v) = self.notes {
            scope.notes = optional_text(v);
        }
        if let Some(active) = self.is_active {
            scope.is_active = active;
        }
        scope.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSafStatus {
    pub saf_status: SafStatus,
    pub saf_document_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn create() -> CreateContract {
        CreateContract {
            client_id: Uuid::new_v4(),
            contract_name: "Managed SOC".to_string(),
            contract_number: None,
            start_date: date("2025-01-01"),
            end_date: date("2025-12-31"),
            renewal_date: None,
            value: Some(dec("120000.00")),
            currency: Some("usd".to_string()),
            status: None,
            document_link: None,
            notes: None,
        }
    }

    fn scope() -> ServiceScope {
        CreateServiceScope {
            service_name: "24x7 Monitoring".to_string(),
            description: None,
            scope_parameters: None,
            price: Some(dec("1000")),
            saf_document_link: None,
            notes: None,
            is_active: None,
        }
        .into_scope(Uuid::new_v4(), Utc::now())
        .unwrap()
    }

    #[test]
    fn contract_dates_are_validated() {
        let mut input = create();
        input.end_date = date("2024-12-31");
        assert!(input.into_contract(Utc::now()).is_err());

        let contract = create().into_contract(Utc::now()).unwrap();
        assert_eq!(contract.currency, "USD");
        assert_eq!(contract.status, ContractStatus::Draft);
    }

    #[test]
    fn patch_revalidates_dates() {
        let mut contract = create().into_contract(Utc::now()).unwrap();
        let patch = UpdateContract { start_date: Some(date("2026-06-01")), ..Default::default() };
        assert!(patch.apply(&mut contract).is_err());
    }

    #[test]
    fn renewal_starts_after_previous_end() {
        let previous = create().into_contract(Utc::now()).unwrap();
        let renewal = RenewContract {
            end_date: date("2026-12-31"),
            value: None,
            contract_name: None,
            contract_number: None,
        }
        .successor(&previous, Utc::now())
        .unwrap();
        assert_eq!(renewal.start_date, date("2026-01-01"));
        assert_eq!(renewal.value, previous.value);
        assert_eq!(renewal.status, ContractStatus::Active);

        let too_short = RenewContract {
            end_date: date("2025-06-30"),
            value: None,
            contract_name: None,
            contract_number: None,
        };
        assert!(too_short.successor(&previous, Utc::now()).is_err());
    }

    #[test]
    fn saf_moves_forward_one_step() {
        let mut s = scope();
        let now = Utc::now();
        assert!(s.transition_saf(SafStatus::SentToClient, now).is_err());
        s.transition_saf(SafStatus::Pending, now).unwrap();
        s.transition_saf(SafStatus::SentToClient, now).unwrap();
        assert_eq!(s.saf_sent_at, Some(now));
        s.transition_saf(SafStatus::Signed, now).unwrap();
        s.transition_saf(SafStatus::Activated, now).unwrap();
        assert!(s.saf_activated_at.is_some());
        assert!(s.transition_saf(SafStatus::Activated, now).is_err());
    }

    #[test]
    fn saf_reset_clears_timestamps() {
        let mut s = scope();
        let now = Utc::now();
        s.transition_saf(SafStatus::Pending, now).unwrap();
        s.transition_saf(SafStatus::SentToClient, now).unwrap();
        s.transition_saf(SafStatus::NotStarted, now).unwrap();
        assert_eq!(s.saf_status, SafStatus::NotStarted);
        assert!(s.saf_sent_at.is_none());
    }

    #[test]
    fn scope_parameters_must_be_object() {
        let mut s = scope();
        let patch = UpdateServiceScope { scope_parameters: Some(serde_json::json!([1, 2])), ..Default::default() };
        assert!(patch.apply(&mut s).is_err());
    }

    #[test]
    fn renewed_copy_resets_workflow() {
        let mut s = scope();
        s.transition_saf(SafStatus::Pending, Utc::now()).unwrap();
        let new_contract = Uuid::new_v4();
        let copy = s.renewed_copy(new_contract, Utc::now());
        assert_eq!(copy.contract_id, new_contract);
        assert_eq!(copy.saf_status, SafStatus::NotStarted);
        assert_ne!(copy.id, s.id);
    }
}
