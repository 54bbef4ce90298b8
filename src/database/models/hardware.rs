use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::validation::{double_option, optional_text, required_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "hardware_type", rename_all = "snake_case")]
pub enum HardwareType {
    Firewall,
    Switch,
    Router,
    Server,
    Sensor,
    Appliance,
    Workstation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "hardware_status", rename_all = "snake_case")]
pub enum HardwareStatus {
    InStock,
    InUse,
    Maintenance,
    Retired,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HardwareAsset {
    pub id: Uuid,
    pub asset_tag: String,
    pub serial_number: Option<String>,
    pub name: String,
    pub asset_type: HardwareType,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub status: HardwareStatus,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<Decimal>,
    pub warranty_expiry_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

fn validate_cost(cost: Option<Decimal>) -> Result<(), ApiError> {
    match cost {
        Some(c) if c < Decimal::ZERO => Err(ApiError::invalid_field("purchase_cost", "Cost cannot be negative")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHardwareAsset {
    pub asset_tag: String,
    pub serial_number: Option<String>,
    pub name: String,
    pub asset_type: Option<HardwareType>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub status: Option<HardwareStatus>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<Decimal>,
    pub warranty_expiry_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl CreateHardwareAsset {
    pub fn into_asset(self, now: DateTime<Utc>) -> Result<HardwareAsset, ApiError> {
        let status = self.status.unwrap_or(HardwareStatus::InStock);
        if status == HardwareStatus::InUse {
            return Err(ApiError::invalid_field(
                "status",
                "Assets enter in_use only through an assignment",
            ));
        }
        validate_cost(self.purchase_cost)?;

        Ok(HardwareAsset {
            id: Uuid::new_v4(),
            asset_tag: required_text("asset_tag", &self.asset_tag, 100)?,
            serial_number: optional_text(self.serial_number),
            name: required_text("name", &self.name, 200)?,
            asset_type: self.asset_type.unwrap_or(HardwareType::Other),
            manufacturer: optional_text(self.manufacturer),
            model: optional_text(self.model),
            status,
            purchase_date: self.purchase_date,
            purchase_cost: self.purchase_cost,
            warranty_expiry_date: self.warranty_expiry_date,
            location: optional_text(self.location),
            notes: optional_text(self.notes),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHardwareAsset {
    pub asset_tag: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub serial_number: Option<Option<String>>,
    pub name: Option<String>,
    pub asset_type: Option<HardwareType>,
    #[serde(default, deserialize_with = "double_option")]
    pub manufacturer: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub model: Option<Option<String>>,
    pub status: Option<HardwareStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub purchase_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub purchase_cost: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub warranty_expiry_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateHardwareAsset {
    /// The status to write, `None` when the patch leaves it alone
    pub fn status_change(&self, current: HardwareStatus) -> Option<HardwareStatus> {
        self.status.filter(|s| *s != current)
    }

    pub fn apply(self, asset: &mut HardwareAsset) -> Result<(), ApiError> {
        if let Some(status) = self.status {
            // in_use belongs to the assignment flow in both directions
            if status != asset.status
                && (status == HardwareStatus::InUse || asset.status == HardwareStatus::InUse)
            {
                return Err(ApiError::invalid_field(
                    "status",
                    "Use the assignment endpoints to move an asset in or out of use",
                ));
            }
            asset.status = status;
        }
        if let Some(tag) = self.asset_tag {
            asset.asset_tag = required_text("asset_tag", &tag, 100)?;
        }
        if let Some(v) = self.serial_number {
            asset.serial_number = optional_text(v);
        }
        if let Some(name) = self.name {
            asset.name = required_text("name", &name, 200)?;
        }
        if let Some(t) = self.asset_type {
            asset.asset_type = t;
        }
        if let Some(v) = self.manufacturer {
            asset.manufacturer = optional_text(v);
        }
        if let Some(v) = self.model {
            asset.model = optional_text(v);
        }
        if let Some(d) = self.purchase_date {
            asset.purchase_date = d;
        }
        if let Some(cost) = self.purchase_cost {
            validate_cost(cost)?;
            asset.purchase_cost = cost;
        }
        if let Some(d) = self.warranty_expiry_date {
            asset.warranty_expiry_date = d;
        }
        if let Some(v) = self.location {
            asset.location = optional_text(v);
        }
        if let Some(v) = self.notes {
            asset.notes = optional_text(v);
        }
        asset.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HardwareFilter {
    pub status: Option<HardwareStatus>,
    pub asset_type: Option<HardwareType>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Returned,
    Replaced,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientHardwareAssignment {
    pub id: Uuid,
    pub hardware_asset_id: Uuid,
    pub client_id: Uuid,
    pub service_scope_id: Option<Uuid>,
    pub status: AssignmentStatus,
    pub assigned_date: NaiveDate,
    pub returned_date: Option<NaiveDate>,
    pub replaced_by_assignment_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientHardwareAssignment {
    pub fn new(
        hardware_asset_id: Uuid,
        client_id: Uuid,
        service_scope_id: Option<Uuid>,
        assigned_date: NaiveDate,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            hardware_asset_id,
            client_id,
            service_scope_id,
            status: AssignmentStatus::Active,
            assigned_date,
            returned_date: None,
            replaced_by_assignment_id: None,
            notes: optional_text(notes),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ensure_active(&self) -> Result<(), ApiError> {
        if self.status != AssignmentStatus::Active {
            return Err(ApiError::bad_request(format!(
                "Assignment {} is already {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignHardware {
    pub hardware_asset_id: Uuid,
    pub client_id: Uuid,
    pub service_scope_id: Option<Uuid>,
    pub assigned_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnHardware {
    pub returned_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceHardware {
    pub replacement_asset_id: Uuid,
    pub notes: Option<String>,
}

/// Result of a replacement: the closed assignment and its successor
#[derive(Debug, Clone, Serialize)]
pub struct ReplacedAssignment {
    pub previous: ClientHardwareAssignment,
    pub replacement: ClientHardwareAssignment,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentFilter {
    pub client_id: Option<Uuid>,
    pub hardware_asset_id: Option<Uuid>,
    pub status: Option<AssignmentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create() -> CreateHardwareAsset {
        CreateHardwareAsset {
            asset_tag: "FW-0001".to_string(),
            serial_number: Some("SN123".to_string()),
            name: "Edge firewall".to_string(),
            asset_type: Some(HardwareType::Firewall),
            manufacturer: None,
            model: None,
            status: None,
            purchase_date: None,
            purchase_cost: None,
            warranty_expiry_date: None,
            location: None,
            notes: None,
        }
    }

    #[test]
    fn create_defaults_to_in_stock() {
        let asset = create().into_asset(Utc::now()).unwrap();
        assert_eq!(asset.status, HardwareStatus::InStock);
    }

    #[test]
    fn create_cannot_start_in_use() {
        let mut input = create();
        input.status = Some(HardwareStatus::InUse);
        assert!(input.into_asset(Utc::now()).is_err());
    }

    #[test]
    fn patch_cannot_touch_in_use() {
        let mut asset = create().into_asset(Utc::now()).unwrap();
        let patch = UpdateHardwareAsset { status: Some(HardwareStatus::InUse), ..Default::default() };
        assert!(patch.apply(&mut asset).is_err());

        asset.status = HardwareStatus::InUse;
        let patch = UpdateHardwareAsset { status: Some(HardwareStatus::Maintenance), ..Default::default() };
        assert!(patch.apply(&mut asset).is_err());

        // unchanged in_use is allowed alongside other edits
        let patch = UpdateHardwareAsset {
            status: Some(HardwareStatus::InUse),
            location: Some(Some("Rack 4".to_string())),
            ..Default::default()
        };
        patch.apply(&mut asset).unwrap();
        assert_eq!(asset.location.as_deref(), Some("Rack 4"));
    }

    #[test]
    fn patch_moves_between_manual_states() {
        let mut asset = create().into_asset(Utc::now()).unwrap();
        let patch = UpdateHardwareAsset { status: Some(HardwareStatus::Maintenance), ..Default::default() };
        patch.apply(&mut asset).unwrap();
        assert_eq!(asset.status, HardwareStatus::Maintenance);
    }

    #[test]
    fn patch_without_status_writes_no_status() {
        let patch = UpdateHardwareAsset { location: Some(Some("Rack 2".to_string())), ..Default::default() };
        assert_eq!(patch.status_change(HardwareStatus::InStock), None);

        let patch = UpdateHardwareAsset { status: Some(HardwareStatus::InUse), ..Default::default() };
        assert_eq!(patch.status_change(HardwareStatus::InUse), None);

        let patch = UpdateHardwareAsset { status: Some(HardwareStatus::Retired), ..Default::default() };
        assert_eq!(patch.status_change(HardwareStatus::InStock), Some(HardwareStatus::Retired));
    }

    #[test]
    fn patch_can_retire_or_lose_stock() {
        for target in [HardwareStatus::Retired, HardwareStatus::Lost, HardwareStatus::InStock] {
            let mut asset = create().into_asset(Utc::now()).unwrap();
            asset.status = HardwareStatus::Maintenance;
            let patch = UpdateHardwareAsset { status: Some(target), ..Default::default() };
            patch.apply(&mut asset).unwrap();
            assert_eq!(asset.status, target);
        }
    }

    #[test]
    fn only_active_assignments_can_close() {
        let today = Utc::now().date_naive();
        let mut assignment =
            ClientHardwareAssignment::new(Uuid::new_v4(), Uuid::new_v4(), None, today, None, Utc::now());
        assert!(assignment.ensure_active().is_ok());
        assignment.status = AssignmentStatus::Returned;
        assert!(assignment.ensure_active().is_err());
    }
}
