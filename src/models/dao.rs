use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Role of a member within a dossier's team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamRole {
    #[serde(rename = "chef_equipe")]
    ChefEquipe,
    #[serde(rename = "membre_equipe")]
    MembreEquipe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: TeamRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A checklist item of a dossier. Ids are assigned `max(existing)+1` and are
/// never reused after a deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u32,
    pub name: String,
    /// 0..=100, or null when not yet started. Always null when the task is
    /// not applicable.
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub is_applicable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// A procurement dossier ("DAO").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dao {
    pub id: String,
    pub numero_liste: String,
    pub objet_dossier: String,
    pub reference: String,
    pub autorite_contractante: String,
    pub date_depot: NaiveDate,
    pub equipe: Vec<TeamMember>,
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dao {
    pub fn team_member(&self, member_id: &str) -> Option<&TeamMember> {
        self.equipe.iter().find(|m| m.id == member_id)
    }

    pub fn task(&self, task_id: u32) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: u32) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Next task id over the *current* set; ids are not reused after deletes.
    pub fn next_task_id(&self) -> u32 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    pub fn has_chef(&self) -> bool {
        self.equipe.iter().any(|m| m.role == TeamRole::ChefEquipe)
    }

    /// Structural invariants of a well-formed dossier.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.objet_dossier.trim().is_empty() {
            return Err(DomainError::validation("objetDossier", "must not be empty"));
        }
        validate_equipe(&self.equipe)?;
        let mut seen = std::collections::HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id) {
                return Err(DomainError::validation(
                    "tasks",
                    format!("duplicate task id {}", task.id),
                ));
            }
            validate_task_fields(task, &self.equipe)?;
        }
        Ok(())
    }
}

pub fn validate_equipe(equipe: &[TeamMember]) -> Result<(), DomainError> {
    if equipe.is_empty() {
        return Err(DomainError::validation("equipe", "must not be empty"));
    }
    if !equipe.iter().any(|m| m.role == TeamRole::ChefEquipe) {
        return Err(DomainError::validation(
            "equipe",
            "at least one chef_equipe is required",
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for member in equipe {
        if member.id.trim().is_empty() {
            return Err(DomainError::validation("equipe", "member id must not be empty"));
        }
        if !seen.insert(member.id.as_str()) {
            return Err(DomainError::validation(
                "equipe",
                format!("duplicate member id {}", member.id),
            ));
        }
    }
    Ok(())
}

fn validate_task_fields(task: &Task, equipe: &[TeamMember]) -> Result<(), DomainError> {
    if task.name.trim().is_empty() {
        return Err(DomainError::validation("name", "task name must not be empty"));
    }
    if let Some(p) = task.progress {
        if p > 100 {
            return Err(DomainError::validation("progress", "must be within 0..=100"));
        }
        if !task.is_applicable {
            return Err(DomainError::validation(
                "progress",
                "must be null when the task is not applicable",
            ));
        }
    }
    if let Some(assignee) = &task.assigned_to {
        if !equipe.iter().any(|m| &m.id == assignee) {
            return Err(DomainError::InvalidReference(format!(
                "team member {}",
                assignee
            )));
        }
    }
    Ok(())
}

/// Draft of a task supplied by a caller; ids and audit stamps are assigned by
/// the rules layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    #[serde(default = "default_applicable")]
    pub is_applicable: bool,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

fn default_applicable() -> bool {
    true
}

/// The fixed procurement checklist seeded into a new dossier when the caller
/// does not supply custom tasks.
pub const DEFAULT_CHECKLIST: [&str; 8] = [
    "Préparation du dossier",
    "Validation interne",
    "Publication de l'avis",
    "Réception des offres",
    "Ouverture des plis",
    "Évaluation des offres",
    "Attribution provisoire",
    "Notification et archivage",
];

pub fn default_checklist() -> Vec<Task> {
    DEFAULT_CHECKLIST
        .iter()
        .enumerate()
        .map(|(i, name)| Task {
            id: i as u32 + 1,
            name: (*name).to_string(),
            progress: None,
            comment: None,
            is_applicable: true,
            assigned_to: None,
            last_updated_by: None,
            last_updated_at: None,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDaoRequest {
    /// Caller-supplied serial; generated server-side when absent.
    #[serde(default)]
    pub numero_liste: Option<String>,
    pub objet_dossier: String,
    pub reference: String,
    pub autorite_contractante: String,
    pub date_depot: NaiveDate,
    pub equipe: Vec<TeamMember>,
    #[serde(default)]
    pub tasks: Option<Vec<TaskDraft>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDaoRequest {
    #[serde(default)]
    pub objet_dossier: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub autorite_contractante: Option<String>,
    #[serde(default)]
    pub date_depot: Option<NaiveDate>,
    #[serde(default)]
    pub equipe: Option<Vec<TeamMember>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn member(id: &str, role: TeamRole) -> TeamMember {
        TeamMember {
            id: id.to_string(),
            name: format!("Member {}", id),
            role,
            email: None,
        }
    }

    fn sample_dao() -> Dao {
        Dao {
            id: "d-1".to_string(),
            numero_liste: "DAO-2025-001".to_string(),
            objet_dossier: "Fourniture de matériel informatique".to_string(),
            reference: "REF-42".to_string(),
            autorite_contractante: "Ministère des Finances".to_string(),
            date_depot: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            equipe: vec![
                member("m1", TeamRole::ChefEquipe),
                member("m2", TeamRole::MembreEquipe),
            ],
            tasks: default_checklist(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_valid_dao_passes() {
        assert!(sample_dao().validate().is_ok());
    }

    #[test]
    fn test_chef_equipe_required() {
        let mut dao = sample_dao();
        dao.equipe = vec![member("m2", TeamRole::MembreEquipe)];
        assert!(matches!(
            dao.validate(),
            Err(DomainError::Validation { field, .. }) if field == "equipe"
        ));
    }

    #[test]
    fn test_duplicate_task_id_rejected() {
        let mut dao = sample_dao();
        dao.tasks[1].id = dao.tasks[0].id;
        assert!(dao.validate().is_err());
    }

    #[test]
    fn test_assignment_must_reference_team() {
        let mut dao = sample_dao();
        dao.tasks[0].assigned_to = Some("ghost".to_string());
        assert!(matches!(
            dao.validate(),
            Err(DomainError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_progress_null_when_not_applicable() {
        let mut dao = sample_dao();
        dao.tasks[0].is_applicable = false;
        dao.tasks[0].progress = Some(40);
        assert!(dao.validate().is_err());
    }

    #[test]
    fn test_next_task_id_over_current_set() {
        let mut dao = sample_dao();
        assert_eq!(dao.next_task_id(), 9);
        dao.tasks.clear();
        assert_eq!(dao.next_task_id(), 1);
    }

    #[test]
    fn test_default_checklist_ids_are_dense() {
        let tasks = default_checklist();
        assert_eq!(tasks.len(), DEFAULT_CHECKLIST.len());
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.id, i as u32 + 1);
            assert!(task.is_applicable);
            assert!(task.progress.is_none());
        }
    }

    #[test]
    fn test_wire_field_names() {
        // Field names are part of the persisted contract.
        let dao = sample_dao();
        let value = serde_json::to_value(&dao).unwrap();
        for key in [
            "id",
            "numeroListe",
            "objetDossier",
            "reference",
            "autoriteContractante",
            "dateDepot",
            "equipe",
            "tasks",
            "createdAt",
            "updatedAt",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
        let task = &value["tasks"][0];
        assert!(task.get("isApplicable").is_some());
        assert!(task.get("progress").is_some());
        assert_eq!(value["equipe"][0]["role"], "chef_equipe");
    }
}
