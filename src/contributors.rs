use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Read a field the service may send as `null` (e.g. `gravatar_id`).
pub(crate) fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Public profile of an account, as returned by the hosting service.
/// Missing or `null` fields are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contributor {
    #[serde(deserialize_with = "null_as_default")]
    pub login: String,
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub avatar_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub gravatar_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub followers_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub following_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub gists_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub starred_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subscriptions_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub organizations_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repos_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub events_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub received_events_url: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub site_admin: bool,
}

/// One repository's report for one contributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorStat {
    pub author: Contributor,
    pub count: u64,
}

impl ContributorStat {
    pub fn new(author: Contributor, count: u64) -> Self {
        Self { author, count }
    }
}

/// A contributor with the running total over every repository merged so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorRecord {
    #[serde(flatten)]
    pub profile: Contributor,
    pub contributions: u64,
}

impl ContributorRecord {
    pub fn login(&self) -> &str {
        &self.profile.login
    }
}

/// Login-keyed tally of contributions.
///
/// `merge` does not deduplicate: feeding the same repository twice counts it
/// twice. Callers are responsible for merging each repository at most once.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: HashMap<String, ContributorRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one stat to the tally. The profile recorded on first sight of a
    /// login is kept; later stats only contribute their count.
    pub fn merge(&mut self, stat: ContributorStat) {
        match self.records.get_mut(&stat.author.login) {
            Some(record) => {
                record.contributions = record.contributions.saturating_add(stat.count);
            }
            None => {
                let login = stat.author.login.clone();
                self.records.insert(
                    login,
                    ContributorRecord {
                        profile: stat.author,
                        contributions: stat.count,
                    },
                );
            }
        }
    }

    pub fn merge_all(&mut self, stats: impl IntoIterator<Item = ContributorStat>) {
        for stat in stats {
            self.merge(stat);
        }
    }

    #[cfg(test)]
    pub fn total(&self, login: &str) -> Option<u64> {
        self.records.get(login).map(|r| r.contributions)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, by descending contributions then ascending login.
    pub fn finalize(self) -> Vec<ContributorRecord> {
        let mut out: Vec<ContributorRecord> = self.records.into_values().collect();
        out.sort_by(|a, b| {
            b.contributions
                .cmp(&a.contributions)
                .then_with(|| a.profile.login.cmp(&b.profile.login))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(login: &str, count: u64) -> ContributorStat {
        ContributorStat::new(
            Contributor {
                login: login.to_string(),
                ..Default::default()
            },
            count,
        )
    }

    #[test]
    fn sums_counts_for_same_login_in_any_order() {
        let counts = [3u64, 7, 1, 12];

        let mut forward = Aggregator::new();
        forward.merge_all(counts.iter().map(|&c| stat("alice", c)));

        let mut backward = Aggregator::new();
        backward.merge_all(counts.iter().rev().map(|&c| stat("alice", c)));

        assert_eq!(forward.total("alice"), Some(23));
        assert_eq!(backward.total("alice"), Some(23));
        assert_eq!(forward.finalize(), backward.finalize());
    }

    #[test]
    fn keeps_first_profile() {
        let mut agg = Aggregator::new();
        let mut first = stat("alice", 2);
        first.author.id = 1;
        first.author.html_url = "https://example.com/alice".into();
        let mut second = stat("alice", 5);
        second.author.id = 99;
        second.author.html_url = "https://example.com/other".into();

        agg.merge(first);
        agg.merge(second);

        let records = agg.finalize();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].profile.id, 1);
        assert_eq!(records[0].profile.html_url, "https://example.com/alice");
        assert_eq!(records[0].contributions, 7);
    }

    #[test]
    fn finalize_orders_by_count_then_login() {
        let mut agg = Aggregator::new();
        agg.merge_all([
            stat("carol", 4),
            stat("bob", 10),
            stat("alice", 4),
            stat("dave", 1),
            stat("erin", 10),
        ]);

        let records = agg.finalize();
        let order: Vec<(&str, u64)> = records
            .iter()
            .map(|r| (r.login(), r.contributions))
            .collect();
        assert_eq!(
            order,
            vec![
                ("bob", 10),
                ("erin", 10),
                ("alice", 4),
                ("carol", 4),
                ("dave", 1)
            ]
        );

        for pair in records.windows(2) {
            assert!(pair[0].contributions >= pair[1].contributions);
            if pair[0].contributions == pair[1].contributions {
                assert!(pair[0].login() < pair[1].login());
            }
        }
    }

    #[test]
    fn empty_aggregator_finalizes_to_nothing() {
        let agg = Aggregator::new();
        assert!(agg.is_empty());
        assert!(agg.finalize().is_empty());
    }

    #[test]
    fn null_profile_fields_read_as_empty() {
        let json = r#"{"login": "alice", "id": 1, "gravatar_id": null, "type": null, "site_admin": null}"#;
        let c: Contributor = serde_json::from_str(json).unwrap();
        assert_eq!(c.login, "alice");
        assert_eq!(c.gravatar_id, "");
        assert_eq!(c.kind, "");
        assert!(!c.site_admin);
    }

    #[test]
    fn record_serializes_with_service_field_names() {
        let mut s = stat("alice", 3);
        s.author.kind = "User".into();
        s.author.site_admin = true;
        let mut agg = Aggregator::new();
        agg.merge(s);

        let json = serde_json::to_value(&agg.finalize()[0]).unwrap();
        assert_eq!(json["login"], "alice");
        assert_eq!(json["type"], "User");
        assert_eq!(json["site_admin"], true);
        assert_eq!(json["contributions"], 3);
    }
}
