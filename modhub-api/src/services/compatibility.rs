//! Compatibility of a mod against a player's reported game state.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Dlc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityStatus {
    Compatible,
    Warning,
    Incompatible,
}

impl CompatibilityStatus {
    /// Never downgrades: incompatible > warning > compatible.
    fn escalate(self, to: CompatibilityStatus) -> Self {
        self.max(to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Version,
    Dlc,
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    pub status: CompatibilityStatus,
    pub issues: Vec<CompatibilityIssue>,
}

fn default_game_version() -> String {
    "1.0".to_string()
}

/// What the player reports about their installation.
#[derive(Debug, Clone, Deserialize)]
pub struct GameState {
    #[serde(default = "default_game_version")]
    pub game_version: String,
    /// DLC slugs, e.g. `"iberia"`.
    #[serde(default)]
    pub dlcs: Vec<String>,
    #[serde(default)]
    pub installed_mods: Vec<Uuid>,
}

/// A mod's declared requirements, loaded by the caller.
#[derive(Debug, Clone)]
pub struct Requirements {
    pub min_game_version: String,
    pub required_dlcs: Vec<Dlc>,
    /// (id, title) of every mod in the conflict set.
    pub conflicts: Vec<(Uuid, String)>,
}

/// Compare dotted game versions segment by segment.
///
/// Numeric segments compare as integers, anything else as plain strings, a
/// leading `v` is ignored and missing trailing segments count as zero. This
/// is deliberately not a raw string comparison: `"1.9" < "1.10"` holds here,
/// where a lexicographic comparison would say the opposite.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let normalize = |v: &str| -> Vec<String> {
        let v = v.trim();
        let v = v.strip_prefix(|c: char| c == 'v' || c == 'V').unwrap_or(v);
        v.split('.').map(|s| s.trim().to_string()).collect()
    };
    let left = normalize(left);
    let right = normalize(right);

    for i in 0..left.len().max(right.len()) {
        let a = left.get(i).map(String::as_str).unwrap_or("0");
        let b = right.get(i).map(String::as_str).unwrap_or("0");
        let ord = match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

pub fn check(requirements: &Requirements, state: &GameState) -> CompatibilityReport {
    let mut status = CompatibilityStatus::Compatible;
    let mut issues = Vec::new();

    if compare_versions(&state.game_version, &requirements.min_game_version) == Ordering::Less {
        status = status.escalate(CompatibilityStatus::Incompatible);
        issues.push(CompatibilityIssue {
            kind: IssueKind::Version,
            message: format!(
                "Requires game version {}+. You have {}.",
                requirements.min_game_version, state.game_version
            ),
        });
    }

    let owned: HashSet<&str> = state.dlcs.iter().map(String::as_str).collect();
    let mut missing: Vec<&str> = requirements
        .required_dlcs
        .iter()
        .filter(|d| !owned.contains(d.slug.as_str()))
        .map(|d| d.name.as_str())
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        status = status.escalate(CompatibilityStatus::Incompatible);
        issues.push(CompatibilityIssue {
            kind: IssueKind::Dlc,
            message: format!("Missing required DLCs: {}.", missing.join(", ")),
        });
    }

    if !state.installed_mods.is_empty() {
        let installed: HashSet<Uuid> = state.installed_mods.iter().copied().collect();
        let mut clashing: Vec<&str> = requirements
            .conflicts
            .iter()
            .filter(|(id, _)| installed.contains(id))
            .map(|(_, title)| title.as_str())
            .collect();
        if !clashing.is_empty() {
            clashing.sort_unstable();
            status = status.escalate(CompatibilityStatus::Warning);
            issues.push(CompatibilityIssue {
                kind: IssueKind::Conflict,
                message: format!("Conflicts with installed mods: {}.", clashing.join(", ")),
            });
        }
    }

    CompatibilityReport { status, issues }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dlc(name: &str, slug: &str) -> Dlc {
        Dlc { id: Uuid::now_v7(), name: name.into(), slug: slug.into() }
    }

    fn state(version: &str, dlcs: &[&str], installed: Vec<Uuid>) -> GameState {
        GameState {
            game_version: version.into(),
            dlcs: dlcs.iter().map(|s| s.to_string()).collect(),
            installed_mods: installed,
        }
    }

    #[test]
    fn old_version_and_missing_dlc_are_both_reported_in_order() {
        let reqs = Requirements {
            min_game_version: "1.50".into(),
            required_dlcs: vec![dlc("Iberia", "iberia")],
            conflicts: vec![],
        };

        let report = check(&reqs, &state("1.49", &[], vec![]));
        assert_eq!(report.status, CompatibilityStatus::Incompatible);
        let kinds: Vec<IssueKind> = report.issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::Version, IssueKind::Dlc]);
        assert_eq!(report.issues[1].message, "Missing required DLCs: Iberia.");
    }

    #[test]
    fn installed_conflict_is_a_warning() {
        let other = Uuid::now_v7();
        let reqs = Requirements {
            min_game_version: "1.40".into(),
            required_dlcs: vec![dlc("Iberia", "iberia")],
            conflicts: vec![(other, "Realistic Traffic".into())],
        };

        let report = check(&reqs, &state("1.50", &["iberia"], vec![other, Uuid::now_v7()]));
        assert_eq!(report.status, CompatibilityStatus::Warning);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::Conflict);
        assert!(report.issues[0].message.contains("Realistic Traffic"));
    }

    #[test]
    fn conflict_does_not_downgrade_incompatible() {
        let other = Uuid::now_v7();
        let reqs = Requirements {
            min_game_version: "2.0".into(),
            required_dlcs: vec![],
            conflicts: vec![(other, "Sound Pack".into())],
        };

        let report = check(&reqs, &state("1.0", &[], vec![other]));
        assert_eq!(report.status, CompatibilityStatus::Incompatible);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn nothing_supplied_and_nothing_required_is_compatible() {
        let reqs = Requirements { min_game_version: "1.0".into(), required_dlcs: vec![], conflicts: vec![] };
        let report = check(&reqs, &state("1.0", &[], vec![]));
        assert_eq!(report.status, CompatibilityStatus::Compatible);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("1.9", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("1.50", "1.49"), Ordering::Greater);
        assert_eq!(compare_versions("1.5", "1.5.0"), Ordering::Equal);
        assert_eq!(compare_versions("v1.2", "1.2"), Ordering::Equal);
        assert_eq!(compare_versions("1.2-beta", "1.2-alpha"), Ordering::Greater);
    }

    #[test]
    fn missing_dlcs_are_sorted_by_name() {
        let reqs = Requirements {
            min_game_version: "1.0".into(),
            required_dlcs: vec![dlc("Scandinavia", "scandinavia"), dlc("Going East!", "going-east")],
            conflicts: vec![],
        };
        let report = check(&reqs, &state("1.0", &[], vec![]));
        assert_eq!(report.issues[0].message, "Missing required DLCs: Going East!, Scandinavia.");
    }

    #[test]
    fn game_state_defaults_version() {
        let state: GameState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.game_version, "1.0");
        assert!(state.dlcs.is_empty());
    }
}
