// src/progress.rs
//
// Derivation of a dossier's completion percentage, its traffic-light status,
// and the next free dossier serial. Pure functions; the clock is an argument.

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;

use crate::errors::DomainError;
use crate::models::dao::Task;

/// Highest sequence a calendar year can hold; generation fails past it.
pub const MAX_SEQ_PER_YEAR: u32 = 999;

/// Traffic-light status of a dossier relative to its submission deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DaoStatus {
    Completed,
    Urgent,
    Safe,
    Default,
}

/// Completion percentage over the applicable tasks only.
///
/// Null progress counts as 0. A dossier with no applicable task reports 0
/// (nothing measurable has been done yet).
pub fn calculate_dao_progress(tasks: &[Task]) -> u8 {
    let applicable: Vec<&Task> = tasks.iter().filter(|t| t.is_applicable).collect();
    if applicable.is_empty() {
        return 0;
    }
    let sum: u32 = applicable
        .iter()
        .map(|t| u32::from(t.progress.unwrap_or(0)))
        .sum();
    let average = f64::from(sum) / applicable.len() as f64;
    average.round().clamp(0.0, 100.0) as u8
}

/// Status derivation, in priority order:
/// 1. 100% done is `completed`, whatever the date;
/// 2. a passed deadline is `urgent`;
/// 3. five or more days left is `safe`;
/// 4. three or fewer days left is `urgent`;
/// 5. exactly four days left is `default` (the deadband).
pub fn calculate_dao_status(date_depot: NaiveDate, today: NaiveDate, progress: u8) -> DaoStatus {
    if progress == 100 {
        return DaoStatus::Completed;
    }
    let days = (date_depot - today).num_days();
    if days < 0 {
        DaoStatus::Urgent
    } else if days >= 5 {
        DaoStatus::Safe
    } else if days <= 3 {
        DaoStatus::Urgent
    } else {
        DaoStatus::Default
    }
}

/// Whole days between today and the deadline, negative once passed.
pub fn days_remaining(date_depot: NaiveDate, today: NaiveDate) -> i64 {
    (date_depot - today).num_days()
}

pub fn dao_status_today(date_depot: NaiveDate, progress: u8) -> DaoStatus {
    calculate_dao_status(date_depot, Utc::now().date_naive(), progress)
}

/// True when a caller-supplied serial matches `DAO-<year>-<seq>`.
pub fn dao_number_is_valid(numero: &str) -> bool {
    Regex::new(r"^DAO-\d{4}-\d{3}$").unwrap().is_match(numero)
}

/// Next serial for `year`: `DAO-<year>-001` when the year is untouched,
/// otherwise max+1 zero-padded. Serials of other years are ignored; a full
/// year (999) is a hard capacity error, never wrapped.
pub fn next_dao_number(existing: &[String], year: i32) -> Result<String, DomainError> {
    let re = Regex::new(&format!(r"^DAO-{}-(\d{{3}})$", year)).unwrap();
    let max_seq = existing
        .iter()
        .filter_map(|numero| {
            re.captures(numero)
                .and_then(|caps| caps[1].parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0);
    let next = max_seq + 1;
    if next > MAX_SEQ_PER_YEAR {
        return Err(DomainError::validation(
            "numeroListe",
            format!("sequence for year {} is exhausted", year),
        ));
    }
    Ok(format!("DAO-{}-{:03}", year, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u32, applicable: bool, progress: Option<u8>) -> Task {
        Task {
            id,
            name: format!("Tâche {}", id),
            progress,
            comment: None,
            is_applicable: applicable,
            assigned_to: None,
            last_updated_by: None,
            last_updated_at: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_progress_averages_applicable_only() {
        let tasks = vec![
            task(1, true, Some(50)),
            task(2, true, Some(100)),
            task(3, false, None),
        ];
        assert_eq!(calculate_dao_progress(&tasks), 75);
    }

    #[test]
    fn test_progress_null_counts_as_zero() {
        let tasks = vec![task(1, true, None), task(2, true, Some(100))];
        assert_eq!(calculate_dao_progress(&tasks), 50);
    }

    #[test]
    fn test_progress_rounds_to_nearest() {
        // (33 + 33 + 34) / 3 = 33.33 -> 33
        let tasks = vec![task(1, true, Some(33)), task(2, true, Some(33)), task(3, true, Some(34))];
        assert_eq!(calculate_dao_progress(&tasks), 33);
        let tasks = vec![task(1, true, Some(1)), task(2, true, Some(2))];
        // 1.5 rounds half away from zero
        assert_eq!(calculate_dao_progress(&tasks), 2);
    }

    #[test]
    fn test_progress_zero_applicable_tasks_is_zero() {
        assert_eq!(calculate_dao_progress(&[]), 0);
        let tasks = vec![task(1, false, None), task(2, false, None)];
        assert_eq!(calculate_dao_progress(&tasks), 0);
    }

    #[test]
    fn test_progress_invariant_under_reordering() {
        let mut tasks = vec![
            task(1, true, Some(10)),
            task(2, true, Some(90)),
            task(3, false, Some(0)),
        ];
        // non-applicable progress must be irrelevant whatever its value
        tasks[2].progress = None;
        let forward = calculate_dao_progress(&tasks);
        tasks.reverse();
        assert_eq!(calculate_dao_progress(&tasks), forward);
    }

    #[test]
    fn test_status_completed_beats_any_date() {
        let past = date(2020, 1, 1);
        let today = date(2025, 6, 15);
        assert_eq!(calculate_dao_status(past, today, 100), DaoStatus::Completed);
    }

    #[test]
    fn test_status_past_deadline_is_urgent() {
        let today = date(2025, 6, 15);
        assert_eq!(
            calculate_dao_status(date(2025, 6, 14), today, 99),
            DaoStatus::Urgent
        );
    }

    #[test]
    fn test_status_boundaries_at_three_four_five_days() {
        let today = date(2025, 6, 15);
        assert_eq!(
            calculate_dao_status(date(2025, 6, 20), today, 10),
            DaoStatus::Safe
        );
        assert_eq!(
            calculate_dao_status(date(2025, 6, 19), today, 10),
            DaoStatus::Default
        );
        assert_eq!(
            calculate_dao_status(date(2025, 6, 18), today, 10),
            DaoStatus::Urgent
        );
    }

    #[test]
    fn test_status_same_day_is_urgent() {
        let today = date(2025, 6, 15);
        assert_eq!(calculate_dao_status(today, today, 50), DaoStatus::Urgent);
    }

    #[test]
    fn test_next_number_empty_year() {
        assert_eq!(next_dao_number(&[], 2025).unwrap(), "DAO-2025-001");
    }

    #[test]
    fn test_next_number_continues_from_max() {
        let existing = vec!["DAO-2025-007".to_string(), "DAO-2025-003".to_string()];
        assert_eq!(next_dao_number(&existing, 2025).unwrap(), "DAO-2025-008");
    }

    #[test]
    fn test_next_number_ignores_other_years_and_noise() {
        let existing = vec![
            "DAO-2024-120".to_string(),
            "DAO-2025-002".to_string(),
            "DAO-2025-12".to_string(),
            "garbage".to_string(),
        ];
        assert_eq!(next_dao_number(&existing, 2025).unwrap(), "DAO-2025-003");
    }

    #[test]
    fn test_next_number_capacity_is_hard() {
        let existing = vec!["DAO-2025-999".to_string()];
        assert!(matches!(
            next_dao_number(&existing, 2025),
            Err(DomainError::Validation { field, .. }) if field == "numeroListe"
        ));
    }

    #[test]
    fn test_supplied_number_grammar() {
        assert!(dao_number_is_valid("DAO-2025-001"));
        assert!(!dao_number_is_valid("DAO-2025-1"));
        assert!(!dao_number_is_valid("DAO-25-001"));
        assert!(!dao_number_is_valid("dao-2025-001"));
    }
}
