use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validation::{double_option, optional_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "team_role", rename_all = "snake_case")]
pub enum TeamRole {
    AccountManager,
    ProjectManager,
    TechnicalLead,
    SecurityAnalyst,
    SupportEngineer,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientTeamAssignment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub assignment_role: TeamRole,
    pub is_active: bool,
    pub assigned_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment joined with the member's name, as shown in team listings
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TeamMember {
    pub id: Uuid,
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub assignment_role: TeamRole,
    pub is_active: bool,
    pub assigned_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// A user's client assignment, as listed under `/api/users/:id/clients`
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserClientAssignment {
    pub assignment_id: Uuid,
    pub client_id: Uuid,
    pub company_name: String,
    pub assignment_role: TeamRole,
    pub assigned_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamAssignment {
    pub user_id: Uuid,
    pub assignment_role: TeamRole,
    pub assigned_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl CreateTeamAssignment {
    pub fn into_assignment(self, client_id: Uuid, now: DateTime<Utc>) -> ClientTeamAssignment {
        ClientTeamAssignment {
            id: Uuid::new_v4(),
            client_id,
            user_id: self.user_id,
            assignment_role: self.assignment_role,
            is_active: true,
            assigned_date: self.assigned_date.unwrap_or_else(|| now.date_naive()),
            end_date: None,
            notes: optional_text(self.notes),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTeamAssignment {
    pub assignment_role: Option<TeamRole>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateTeamAssignment {
    /// Applies the patch; returns whether the role changed
    pub fn apply(self, assignment: &mut ClientTeamAssignment) -> bool {
        let mut role_changed = false;
        if let Some(role) = self.assignment_role {
            role_changed = role != assignment.assignment_role;
            assignment.assignment_role = role;
        }
        if let Some(v) = self.notes {
            assignment.notes = optional_text(v);
        }
        assignment.updated_at = Utc::now();
        role_changed
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_change_is_reported() {
        let mut assignment = CreateTeamAssignment {
            user_id: Uuid::new_v4(),
            assignment_role: TeamRole::TechnicalLead,
            assigned_date: None,
            notes: Some("  ".to_string()),
        }
        .into_assignment(Uuid::new_v4(), Utc::now());
        assert!(assignment.is_active);
        assert_eq!(assignment.notes, None);

        let same = UpdateTeamAssignment { assignment_role: Some(TeamRole::TechnicalLead), notes: None };
        assert!(!same.apply(&mut assignment));

        let other = UpdateTeamAssignment { assignment_role: Some(TeamRole::SecurityAnalyst), notes: None };
        assert!(other.apply(&mut assignment));
    }

    #[test]
    fn include_inactive_defaults_false() {
        let q: TeamListQuery = serde_json::from_str("{}").unwrap();
        assert!(!q.include_inactive);
    }
}
