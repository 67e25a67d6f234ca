use relay_core::parse_rfc3339_to_unix_ms;
use relay_github::models::GithubArtifact;

/// Picks the newest non-expired artifact.
///
/// A missing or unparsable `created_at` counts as the epoch and ranks below a
/// dated entry at the same instant. Equal ranks go to the later candidate.
pub fn select_latest<'a, I>(candidates: I) -> Option<&'a GithubArtifact>
where
    I: IntoIterator<Item = &'a GithubArtifact>,
{
    candidates
        .into_iter()
        .filter(|artifact| !artifact.expired)
        .fold(None, |latest: Option<&GithubArtifact>, artifact| match latest {
            None => Some(artifact),
            Some(current) if created_rank(artifact) >= created_rank(current) => Some(artifact),
            Some(current) => Some(current),
        })
}

fn created_rank(artifact: &GithubArtifact) -> (u64, bool) {
    let parsed = artifact
        .created_at
        .as_deref()
        .and_then(parse_rfc3339_to_unix_ms);
    (parsed.unwrap_or(0), parsed.is_some())
}

#[cfg(test)]
mod tests {
    use relay_github::models::GithubArtifact;

    use super::select_latest;

    fn artifact(id: u64, expired: bool, created_at: Option<&str>) -> GithubArtifact {
        GithubArtifact {
            id,
            name: "action-agent-session-issue-7".to_string(),
            expired,
            created_at: created_at.map(ToOwned::to_owned),
            workflow_run: None,
        }
    }

    #[test]
    fn unit_select_latest_returns_none_for_empty_or_all_expired() {
        let empty: Vec<GithubArtifact> = Vec::new();
        assert!(select_latest(&empty).is_none());
        let expired = vec![artifact(1, true, Some("2026-01-02T00:00:00Z"))];
        assert!(select_latest(&expired).is_none());
    }

    #[test]
    fn functional_select_latest_prefers_newest_non_expired() {
        let candidates = vec![
            artifact(1, false, Some("2026-01-01T00:00:00Z")),
            artifact(2, true, Some("2026-03-01T00:00:00Z")),
            artifact(3, false, Some("2026-02-01T00:00:00Z")),
            artifact(4, false, Some("2026-01-15T00:00:00Z")),
        ];
        assert_eq!(select_latest(&candidates).map(|a| a.id), Some(3));
    }

    #[test]
    fn regression_select_latest_treats_missing_timestamp_as_epoch() {
        let candidates = vec![
            artifact(1, false, None),
            artifact(2, false, Some("1970-01-01T00:00:00.001Z")),
        ];
        assert_eq!(select_latest(&candidates).map(|a| a.id), Some(2));

        let undated_only = vec![artifact(5, false, None), artifact(6, false, Some("garbage"))];
        assert_eq!(select_latest(&undated_only).map(|a| a.id), Some(6));
    }

    #[test]
    fn regression_select_latest_ranks_epoch_dated_above_undated() {
        let candidates = vec![
            artifact(1, false, None),
            artifact(2, false, Some("1970-01-01T00:00:00Z")),
        ];
        assert_eq!(select_latest(&candidates).map(|a| a.id), Some(2));

        let reversed = vec![
            artifact(2, false, Some("1970-01-01T00:00:00Z")),
            artifact(1, false, None),
        ];
        assert_eq!(select_latest(&reversed).map(|a| a.id), Some(2));

        let same_instant = vec![
            artifact(3, false, Some("2026-01-01T00:00:00Z")),
            artifact(4, false, Some("2026-01-01T00:00:00Z")),
        ];
        assert_eq!(select_latest(&same_instant).map(|a| a.id), Some(4));
    }
}
