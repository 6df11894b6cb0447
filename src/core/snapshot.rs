/// Point-in-time knowledge of which servers are usable for a conversation.
///
/// A pending snapshot means "not yet resolved" and must never be treated as an
/// empty, final answer; the store keeps the last known selection until a
/// fetched snapshot arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    servers: Vec<String>,
    fetched: bool,
}

impl AvailabilitySnapshot {
    /// A snapshot that has actually been fetched from the availability source.
    pub fn resolved<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            servers: normalize_ids(servers),
            fetched: true,
        }
    }

    /// A snapshot for a source that has not resolved yet.
    pub fn pending() -> Self {
        Self {
            servers: Vec::new(),
            fetched: false,
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn contains(&self, id: &str) -> bool {
        self.servers.iter().any(|server| server == id)
    }
}

/// Trim ids and drop duplicates and empties, keeping first-occurrence order.
pub(crate) fn normalize_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for id in ids {
        let id = id.as_ref().trim();
        if id.is_empty() {
            continue;
        }
        if normalized.iter().any(|existing| existing == id) {
            continue;
        }
        normalized.push(id.to_string());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_first_occurrence_order() {
        let ids = normalize_ids(["web", "time", "web", " time "]);
        assert_eq!(ids, vec!["web".to_string(), "time".to_string()]);
    }

    #[test]
    fn normalize_drops_empty_ids() {
        let ids = normalize_ids(["", "   ", "search"]);
        assert_eq!(ids, vec!["search".to_string()]);
    }

    #[test]
    fn pending_snapshot_is_not_fetched() {
        let snapshot = AvailabilitySnapshot::pending();
        assert!(!snapshot.is_fetched());
        assert!(snapshot.servers().is_empty());
    }

    #[test]
    fn resolved_snapshot_normalizes_servers() {
        let snapshot = AvailabilitySnapshot::resolved(["time", "time", " web"]);
        assert!(snapshot.is_fetched());
        assert_eq!(snapshot.servers(), ["time", "web"]);
        assert!(snapshot.contains("web"));
        assert!(!snapshot.contains("search"));
    }
}
