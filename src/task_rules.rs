// src/task_rules.rs
//
// Mutation rules for the checklist of a dossier. Every function validates the
// whole request before touching the Dao: a failed call leaves it unchanged,
// including its `updatedAt`. Successful calls always restamp the audit fields,
// even when the patch changes nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::errors::DomainError;
use crate::models::dao::{Dao, Task, TaskDraft};

/// Partial update of a task. Absent fields are left untouched; an explicit
/// JSON `null` clears `progress`, `comment` or `assignedTo`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub is_applicable: Option<bool>,
    #[serde(deserialize_with = "double_option")]
    pub progress: Option<Option<u8>>,
    #[serde(deserialize_with = "double_option")]
    pub comment: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub assigned_to: Option<Option<String>>,
}

impl TaskPatch {
    /// True when the patch touches the task's name, which is a structural
    /// change gated to administrators.
    pub fn renames(&self) -> bool {
        self.name.is_some()
    }
}

// Keeps "field absent" distinguishable from "field: null" after deserialization.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Appends a new task and returns its id.
pub fn add_task(
    dao: &mut Dao,
    draft: TaskDraft,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<u32, DomainError> {
    if draft.name.trim().is_empty() {
        return Err(DomainError::validation("name", "task name must not be empty"));
    }
    let progress = if draft.is_applicable {
        match draft.progress {
            Some(p) if p > 100 => {
                return Err(DomainError::validation("progress", "must be within 0..=100"))
            }
            other => other,
        }
    } else {
        // Not counted toward completion, so it carries no progress.
        None
    };
    if let Some(assignee) = &draft.assigned_to {
        if dao.team_member(assignee).is_none() {
            return Err(DomainError::InvalidReference(format!(
                "team member {}",
                assignee
            )));
        }
    }

    let id = dao.next_task_id();
    dao.tasks.push(Task {
        id,
        name: draft.name.trim().to_string(),
        progress,
        comment: draft.comment,
        is_applicable: draft.is_applicable,
        assigned_to: draft.assigned_to,
        last_updated_by: Some(actor_id.to_string()),
        last_updated_at: Some(now),
    });
    dao.updated_at = now;
    Ok(id)
}

/// Applies a partial patch to one task.
pub fn update_task(
    dao: &mut Dao,
    task_id: u32,
    patch: &TaskPatch,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let idx = dao
        .tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| DomainError::not_found(format!("task {}", task_id)))?;
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "task name must not be empty"));
        }
    }
    if let Some(Some(assignee)) = &patch.assigned_to {
        if dao.team_member(assignee).is_none() {
            return Err(DomainError::InvalidReference(format!(
                "team member {}",
                assignee
            )));
        }
    }

    let task = &mut dao.tasks[idx];
    if let Some(name) = &patch.name {
        task.name = name.trim().to_string();
    }
    if let Some(applicable) = patch.is_applicable {
        task.is_applicable = applicable;
        if !applicable {
            task.progress = None;
        }
    }
    if let Some(progress) = patch.progress {
        // Clamped rather than rejected; a task taken out of scope in the same
        // patch stays at null.
        task.progress = if task.is_applicable {
            progress.map(|p| p.min(100))
        } else {
            None
        };
    }
    if let Some(comment) = &patch.comment {
        task.comment = comment.clone();
    }
    if let Some(assigned) = &patch.assigned_to {
        task.assigned_to = assigned.clone();
    }

    task.last_updated_by = Some(actor_id.to_string());
    task.last_updated_at = Some(now);
    dao.updated_at = now;
    Ok(())
}

/// Removes a task. Remaining ids are not renumbered, so the next id rule keeps
/// working over the surviving set.
pub fn delete_task(dao: &mut Dao, task_id: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
    if dao.task(task_id).is_none() {
        return Err(DomainError::not_found(format!("task {}", task_id)));
    }
    dao.tasks.retain(|t| t.id != task_id);
    dao.updated_at = now;
    Ok(())
}

pub fn assign_task(
    dao: &mut Dao,
    task_id: u32,
    member_id: &str,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let patch = TaskPatch {
        assigned_to: Some(Some(member_id.to_string())),
        ..TaskPatch::default()
    };
    update_task(dao, task_id, &patch, actor_id, now)
}

pub fn unassign_task(
    dao: &mut Dao,
    task_id: u32,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let patch = TaskPatch {
        assigned_to: Some(None),
        ..TaskPatch::default()
    };
    update_task(dao, task_id, &patch, actor_id, now)
}

/// Replaces the team of a dossier. Assignments pointing at members that left
/// are cleared; the audit stamp of those tasks is refreshed.
pub fn replace_equipe(
    dao: &mut Dao,
    equipe: Vec<crate::models::dao::TeamMember>,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    crate::models::dao::validate_equipe(&equipe)?;
    dao.equipe = equipe;
    for task in &mut dao.tasks {
        let dangling = task
            .assigned_to
            .as_ref()
            .map(|id| !dao.equipe.iter().any(|m| &m.id == id))
            .unwrap_or(false);
        if dangling {
            task.assigned_to = None;
            task.last_updated_by = Some(actor_id.to_string());
            task.last_updated_at = Some(now);
        }
    }
    dao.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dao::{TeamMember, TeamRole};
    use chrono::{NaiveDate, TimeZone};

    fn member(id: &str, role: TeamRole) -> TeamMember {
        TeamMember {
            id: id.to_string(),
            name: format!("Member {}", id),
            role,
            email: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 10, 0, 0).unwrap()
    }

    fn later() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 11, 0, 0).unwrap()
    }

    fn draft(name: &str) -> TaskDraft {
        TaskDraft {
            name: name.to_string(),
            is_applicable: true,
            progress: None,
            comment: None,
            assigned_to: None,
        }
    }

    fn sample_dao() -> Dao {
        let mut dao = Dao {
            id: "d-1".to_string(),
            numero_liste: "DAO-2025-001".to_string(),
            objet_dossier: "Travaux de réhabilitation".to_string(),
            reference: "REF-7".to_string(),
            autorite_contractante: "Commune de Thiès".to_string(),
            date_depot: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            equipe: vec![
                member("m1", TeamRole::ChefEquipe),
                member("m2", TeamRole::MembreEquipe),
            ],
            tasks: Vec::new(),
            created_at: now(),
            updated_at: now(),
        };
        for name in ["Préparation", "Publication", "Évaluation"] {
            add_task(&mut dao, draft(name), "seed", now()).unwrap();
        }
        dao
    }

    #[test]
    fn test_add_task_assigns_max_plus_one() {
        let mut dao = sample_dao();
        assert_eq!(dao.tasks.iter().map(|t| t.id).collect::<Vec<_>>(), [1, 2, 3]);
        let id = add_task(&mut dao, draft("Attribution"), "u-9", later()).unwrap();
        assert_eq!(id, 4);
        assert_eq!(dao.updated_at, later());
        let task = dao.task(4).unwrap();
        assert_eq!(task.last_updated_by.as_deref(), Some("u-9"));
    }

    #[test]
    fn test_deleted_ids_are_not_reused() {
        let mut dao = sample_dao();
        delete_task(&mut dao, 3, later()).unwrap();
        let id = add_task(&mut dao, draft("Relecture"), "u-9", later()).unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn test_add_task_rejects_out_of_range_progress() {
        let mut dao = sample_dao();
        let mut d = draft("Contrôle");
        d.progress = Some(101);
        assert!(add_task(&mut dao, d, "u-9", later()).is_err());
        assert_eq!(dao.tasks.len(), 3);
        assert_eq!(dao.updated_at, now());
    }

    #[test]
    fn test_add_task_forces_null_progress_when_not_applicable() {
        let mut dao = sample_dao();
        let mut d = draft("Hors périmètre");
        d.is_applicable = false;
        d.progress = Some(60);
        let id = add_task(&mut dao, d, "u-9", later()).unwrap();
        assert_eq!(dao.task(id).unwrap().progress, None);
    }

    #[test]
    fn test_add_task_rejects_unknown_assignee() {
        let mut dao = sample_dao();
        let mut d = draft("Suivi");
        d.assigned_to = Some("ghost".to_string());
        assert!(matches!(
            add_task(&mut dao, d, "u-9", later()),
            Err(DomainError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_update_unknown_task_leaves_dao_untouched() {
        let mut dao = sample_dao();
        let before = dao.updated_at;
        let patch = TaskPatch {
            progress: Some(Some(50)),
            ..TaskPatch::default()
        };
        assert!(matches!(
            update_task(&mut dao, 99, &patch, "u-9", later()),
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(dao.updated_at, before);
    }

    #[test]
    fn test_update_applies_partial_patch() {
        let mut dao = sample_dao();
        let patch = TaskPatch {
            progress: Some(Some(40)),
            comment: Some(Some("en cours".to_string())),
            ..TaskPatch::default()
        };
        update_task(&mut dao, 2, &patch, "u-9", later()).unwrap();
        let task = dao.task(2).unwrap();
        assert_eq!(task.progress, Some(40));
        assert_eq!(task.comment.as_deref(), Some("en cours"));
        assert_eq!(task.name, "Publication");
        assert_eq!(task.last_updated_at, Some(later()));
    }

    #[test]
    fn test_update_clamps_progress() {
        let mut dao = sample_dao();
        let patch = TaskPatch {
            progress: Some(Some(250)),
            ..TaskPatch::default()
        };
        update_task(&mut dao, 1, &patch, "u-9", later()).unwrap();
        assert_eq!(dao.task(1).unwrap().progress, Some(100));
    }

    #[test]
    fn test_update_forces_null_when_patch_disables_applicability() {
        let mut dao = sample_dao();
        let patch = TaskPatch {
            is_applicable: Some(false),
            progress: Some(Some(80)),
            ..TaskPatch::default()
        };
        update_task(&mut dao, 1, &patch, "u-9", later()).unwrap();
        let task = dao.task(1).unwrap();
        assert!(!task.is_applicable);
        assert_eq!(task.progress, None);
    }

    #[test]
    fn test_noop_patch_still_restamps_audit_fields() {
        let mut dao = sample_dao();
        update_task(&mut dao, 1, &TaskPatch::default(), "u-9", later()).unwrap();
        let task = dao.task(1).unwrap();
        assert_eq!(task.last_updated_by.as_deref(), Some("u-9"));
        assert_eq!(task.last_updated_at, Some(later()));
        assert_eq!(dao.updated_at, later());
    }

    #[test]
    fn test_assign_and_unassign() {
        let mut dao = sample_dao();
        assign_task(&mut dao, 1, "m2", "u-9", later()).unwrap();
        assert_eq!(dao.task(1).unwrap().assigned_to.as_deref(), Some("m2"));
        unassign_task(&mut dao, 1, "u-9", later()).unwrap();
        assert_eq!(dao.task(1).unwrap().assigned_to, None);
    }

    #[test]
    fn test_assign_to_unknown_member_fails() {
        let mut dao = sample_dao();
        assert!(matches!(
            assign_task(&mut dao, 1, "ghost", "u-9", later()),
            Err(DomainError::InvalidReference(_))
        ));
        assert_eq!(dao.task(1).unwrap().assigned_to, None);
    }

    #[test]
    fn test_delete_unknown_task_is_not_found() {
        let mut dao = sample_dao();
        assert!(matches!(
            delete_task(&mut dao, 42, later()),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_replace_equipe_requires_chef() {
        let mut dao = sample_dao();
        let result = replace_equipe(
            &mut dao,
            vec![member("m3", TeamRole::MembreEquipe)],
            "u-9",
            later(),
        );
        assert!(result.is_err());
        assert_eq!(dao.equipe.len(), 2);
    }

    #[test]
    fn test_replace_equipe_clears_dangling_assignments() {
        let mut dao = sample_dao();
        assign_task(&mut dao, 1, "m2", "u-9", now()).unwrap();
        replace_equipe(&mut dao, vec![member("m1", TeamRole::ChefEquipe)], "u-9", later()).unwrap();
        assert_eq!(dao.task(1).unwrap().assigned_to, None);
        assert_eq!(dao.task(1).unwrap().last_updated_at, Some(later()));
    }

    #[test]
    fn test_patch_null_clears_assignment_via_json() {
        let mut dao = sample_dao();
        assign_task(&mut dao, 1, "m2", "u-9", now()).unwrap();
        let patch: TaskPatch = serde_json::from_str(r#"{ "assignedTo": null }"#).unwrap();
        update_task(&mut dao, 1, &patch, "u-9", later()).unwrap();
        assert_eq!(dao.task(1).unwrap().assigned_to, None);

        // An absent field must leave the assignment alone.
        assign_task(&mut dao, 1, "m2", "u-9", now()).unwrap();
        let patch: TaskPatch = serde_json::from_str(r#"{ "progress": 10 }"#).unwrap();
        update_task(&mut dao, 1, &patch, "u-9", later()).unwrap();
        assert_eq!(dao.task(1).unwrap().assigned_to.as_deref(), Some("m2"));
    }
}
