use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::core::snapshot::{normalize_ids, AvailabilitySnapshot};
use crate::persistence::SelectionPersistence;

/// Returned by [`SelectionStore::set_selected`] when the requested selection
/// contains an unusable server id. Duplicates are not an error; they are
/// silently deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSelection {
    offending: String,
}

impl InvalidSelection {
    pub fn offending(&self) -> &str {
        &self.offending
    }
}

impl fmt::Display for InvalidSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid server id in selection: {:?}",
            self.offending
        )
    }
}

impl std::error::Error for InvalidSelection {}

/// Per-conversation selection state.
///
/// `removed_defaults` is first-class state rather than being inferred from a
/// set difference; inferring it would reintroduce a default the user just
/// removed the moment availability data arrives.
///
/// `available` is `Some` once the one-shot availability prune has run, and
/// remembers what was available at that moment so a later defaults update
/// cannot re-add a server the prune removed. That keeps defaults and
/// availability events commutative in every interleaving.
#[derive(Debug, Clone, Default)]
struct SelectionRecord {
    selected: Vec<String>,
    removed_defaults: Vec<String>,
    available: Option<Vec<String>>,
}

impl SelectionRecord {
    fn fresh(defaults: Option<&[String]>) -> Self {
        Self {
            selected: defaults.unwrap_or(&[]).to_vec(),
            ..Self::default()
        }
    }

    /// Seed from a persisted snapshot. The snapshot reflects the user's last
    /// committed state, so defaults absent from it count as explicitly
    /// removed; re-unioning them here would resurrect deselected defaults
    /// across restarts.
    fn from_snapshot(snapshot: Vec<String>, defaults: Option<&[String]>) -> Self {
        let selected = normalize_ids(snapshot);
        let removed_defaults = defaults
            .unwrap_or(&[])
            .iter()
            .filter(|default| !selected.contains(*default))
            .cloned()
            .collect();
        Self {
            selected,
            removed_defaults,
            available: None,
        }
    }
}

/// Owns the authoritative selected server set for every conversation and
/// reconciles it against declared defaults, fetched availability, and the
/// persisted snapshot.
///
/// The store is event-driven: it mutates only when the host pushes a user
/// selection, a defaults update, or an availability snapshot, and it persists
/// every committed change through the adapter it was constructed with.
pub struct SelectionStore<P: SelectionPersistence> {
    records: HashMap<String, SelectionRecord>,
    defaults: Option<Vec<String>>,
    persistence: P,
}

impl<P: SelectionPersistence> SelectionStore<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            records: HashMap::new(),
            defaults: None,
            persistence,
        }
    }

    /// Current selection for a conversation.
    ///
    /// Creates the record on first access, seeded from the persisted snapshot
    /// when one exists and from the current defaults otherwise. Seeding never
    /// writes back to persistence.
    pub fn selected(&mut self, context: &str) -> &[String] {
        &self.ensure_record(context).selected
    }

    /// Read-only view for render paths. Returns an empty slice for an unseen
    /// conversation without creating a record.
    pub fn peek_selected(&self, context: &str) -> &[String] {
        self.records
            .get(context)
            .map(|record| record.selected.as_slice())
            .unwrap_or(&[])
    }

    /// The defaults most recently observed, if any.
    pub fn current_defaults(&self) -> &[String] {
        self.defaults.as_deref().unwrap_or(&[])
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Replace a conversation's selection with an explicit user choice.
    ///
    /// Any currently known default absent from `values` is marked explicitly
    /// removed and stays removed across later defaults updates until the user
    /// re-adds it. Duplicate ids are deduplicated; blank ids are rejected.
    pub fn set_selected(&mut self, context: &str, values: &[String]) -> Result<(), InvalidSelection> {
        if let Some(blank) = values.iter().find(|value| value.trim().is_empty()) {
            return Err(InvalidSelection {
                offending: blank.clone(),
            });
        }

        let values = normalize_ids(values);
        let defaults = self.defaults.clone();
        let committed = {
            let record = self.ensure_record(context);
            if let Some(defaults) = &defaults {
                for default in defaults {
                    if values.contains(default) {
                        record.removed_defaults.retain(|removed| removed != default);
                    } else if !record.removed_defaults.contains(default) {
                        record.removed_defaults.push(default.clone());
                    }
                }
            }
            if record.selected == values {
                None
            } else {
                record.selected = values;
                Some(record.selected.clone())
            }
        };

        if let Some(selected) = committed {
            debug!(context, count = selected.len(), "committed user selection");
            self.persistence.save(context, &selected);
        }
        Ok(())
    }

    /// Apply an updated set of declared defaults to every known conversation.
    ///
    /// Each default joins a conversation's selection unless the user has
    /// explicitly removed it there, or the conversation's availability prune
    /// already established the server is unavailable. Applying the same
    /// defaults twice is a no-op; a shrinking default set never removes
    /// anything from a selection.
    pub fn apply_defaults<I, S>(&mut self, defaults: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let defaults = normalize_ids(defaults);
        let mut dirty: Vec<(String, Vec<String>)> = Vec::new();
        for (context, record) in &mut self.records {
            let mut changed = false;
            for default in &defaults {
                if record.removed_defaults.contains(default) {
                    continue;
                }
                if let Some(available) = &record.available {
                    if !available.contains(default) {
                        continue;
                    }
                }
                if !record.selected.contains(default) {
                    record.selected.push(default.clone());
                    changed = true;
                }
            }
            if changed {
                dirty.push((context.clone(), record.selected.clone()));
            }
        }
        debug!(
            defaults = defaults.len(),
            updated = dirty.len(),
            "applied default servers"
        );
        self.defaults = Some(defaults);
        for (context, selected) in dirty {
            self.persistence.save(&context, &selected);
        }
    }

    /// Reconcile a conversation's selection against an availability snapshot.
    ///
    /// An unfetched snapshot is ignored; the last known selection stays in
    /// place until real data arrives. Once a fetched snapshot has been applied
    /// to a conversation, later snapshots are ignored for its lifetime, so a
    /// server the user adds after the prune is never silently dropped. The
    /// applied prune is a plain intersection; an empty snapshot clears the
    /// selection and defaults are not forced back in.
    pub fn observe_availability(&mut self, context: &str, snapshot: &AvailabilitySnapshot) {
        if !snapshot.is_fetched() {
            debug!(context, "availability not fetched yet; keeping selection");
            return;
        }

        let committed = {
            let record = self.ensure_record(context);
            if record.available.is_some() {
                debug!(context, "availability already reconciled; ignoring");
                None
            } else {
                let before = record.selected.len();
                record.selected.retain(|id| snapshot.contains(id));
                record.available = Some(snapshot.servers().to_vec());
                if record.selected.len() == before {
                    None
                } else {
                    debug!(
                        context,
                        pruned = before - record.selected.len(),
                        "pruned unavailable servers"
                    );
                    Some(record.selected.clone())
                }
            }
        };

        if let Some(selected) = committed {
            self.persistence.save(context, &selected);
        }
    }

    /// Display label for a conversation's selection.
    ///
    /// Members of the current default set are excluded from the visible
    /// count, so a selection consisting only of defaults still shows the
    /// placeholder. Pure projection: never mutates, never persists, and safe
    /// to call on every render.
    pub fn render_label(&self, context: &str, placeholder: &str) -> String {
        let defaults = self.current_defaults();
        let visible: Vec<&String> = self
            .peek_selected(context)
            .iter()
            .filter(|id| !defaults.contains(*id))
            .collect();
        match visible.as_slice() {
            [] => placeholder.to_string(),
            [only] => (*only).clone(),
            more => format!("{} selected", more.len()),
        }
    }

    fn ensure_record(&mut self, context: &str) -> &mut SelectionRecord {
        let Self {
            records,
            defaults,
            persistence,
        } = self;
        records
            .entry(context.to_string())
            .or_insert_with(|| match persistence.load(context) {
                Some(snapshot) => {
                    debug!(context, "seeded selection from persisted snapshot");
                    SelectionRecord::from_snapshot(snapshot, defaults.as_deref())
                }
                None => SelectionRecord::fresh(defaults.as_deref()),
            })
    }
}
