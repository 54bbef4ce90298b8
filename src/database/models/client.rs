use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::validation::{double_option, optional_text, required_text, validate_email};

const MAX_NAME: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "client_status", rename_all = "snake_case")]
pub enum ClientStatus {
    Prospect,
    Active,
    Inactive,
    Churned,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub company_name: String,
    pub industry: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub status: ClientStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    pub company_name: String,
    pub industry: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub status: Option<ClientStatus>,
    pub notes: Option<String>,
}

impl CreateClient {
    pub fn into_client(self, now: DateTime<Utc>) -> Result<Client, ApiError> {
        let contact_email = optional_text(self.contact_email);
        if let Some(email) = &contact_email {
            validate_email("contact_email", email)?;
        }

        Ok(Client {
            id: Uuid::new_v4(),
            company_name: required_text("company_name", &self.company_name, MAX_NAME)?,
            industry: optional_text(self.industry),
            contact_name: optional_text(self.contact_name),
            contact_email,
            contact_phone: optional_text(self.contact_phone),
            address: optional_text(self.address),
            website: optional_text(self.website),
            status: self.status.unwrap_or(ClientStatus::Prospect),
            notes: optional_text(self.notes),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClient {
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub industry: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    pub status: Option<ClientStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateClient {
    /// Applies the patch in place; returns whether the company name changed
    pub fn apply(self, client: &mut Client) -> Result<bool, ApiError> {
        let mut renamed = false;
        if let Some(name) = self.company_name {
            let name = required_text("company_name", &name, MAX_NAME)?;
            renamed = !name.eq_ignore_ascii_case(&client.company_name);
            client.company_name = name;
        }
        if let Some(email) = self.contact_email {
            let email = optional_text(email);
            if let Some(e) = &email {
                validate_email("contact_email", e)?;
            }
            client.contact_email = email;
        }
        if let Some(v) = self.industry {
            client.industry = optional_text(v);
        }
        if let Some(v) = self.contact_name {
            client.contact_name = optional_text(v);
        }
        if let Some(v) = self.contact_phone {
            client.contact_phone = optional_text(v);
        }
        if let Some(v) = self.address {
            client.address = optional_text(v);
        }
        if let Some(v) = self.website {
            client.website = optional_text(v);
        }
        if let Some(status) = self.status {
            client.status = status;
        }
        if let Some(v) = self.notes {
            client.notes = optional_text(v);
        }
        client.updated_at = Utc::now();
        Ok(renamed)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFilter {
    pub status: Option<ClientStatus>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str) -> CreateClient {
        CreateClient {
            company_name: name.to_string(),
            industry: Some("  Finance ".to_string()),
            contact_name: None,
            contact_email: Some("ciso@acme.example".to_string()),
            contact_phone: Some("   ".to_string()),
            address: None,
            website: None,
            status: None,
            notes: None,
        }
    }

    #[test]
    fn create_trims_and_defaults() {
        let client = create("  Acme Corp ").into_client(Utc::now()).unwrap();
        assert_eq!(client.company_name, "Acme Corp");
        assert_eq!(client.industry.as_deref(), Some("Finance"));
        assert_eq!(client.contact_phone, None);
        assert_eq!(client.status, ClientStatus::Prospect);
    }

    #[test]
    fn create_rejects_bad_email_and_blank_name() {
        let mut input = create("Acme");
        input.contact_email = Some("not-an-email".to_string());
        assert!(input.into_client(Utc::now()).is_err());
        assert!(create("   ").into_client(Utc::now()).is_err());
    }

    #[test]
    fn patch_reports_rename_and_clears_fields() {
        let mut client = create("Acme").into_client(Utc::now()).unwrap();
        let patch: UpdateClient =
            serde_json::from_value(serde_json::json!({ "company_name": "ACME", "industry": null })).unwrap();
        // case-only change is not a rename for uniqueness purposes
        assert!(!patch.apply(&mut client).unwrap());
        assert_eq!(client.company_name, "ACME");
        assert_eq!(client.industry, None);

        let patch: UpdateClient =
            serde_json::from_value(serde_json::json!({ "company_name": "Globex", "status": "active" })).unwrap();
        assert!(patch.apply(&mut client).unwrap());
        assert_eq!(client.status, ClientStatus::Active);
        assert_eq!(client.contact_email.as_deref(), Some("ciso@acme.example"));
    }
}
