//! The reconciliation engine.
//!
//! One `perform_sync` call runs a full pass: fetch both sides in parallel,
//! build lookup maps, propagate board→database, propagate database→board
//! (including the one-way derived fields), then apply the
//! deletion-by-convention protocol. Per-record failures are logged and
//! counted without aborting the pass; only the upfront bulk fetch is fatal.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

use crate::mapper;
use crate::model::{
    FieldValue, SyncStats, CARD_ID_PROP, DEPARTMENT_PROP, NOTION_LINK_FIELD, SCORE_FIELDS,
    SYNCED_FIELD, TITLE_PROP, TOTAL_SCORE_FIELD,
};
use crate::notion::model::prop;
use crate::notion::{DatabaseService, Page};
use crate::trello::{BoardList, BoardService, Card, CustomFieldDef};

pub struct SyncEngine<B, D> {
    board: B,
    database: D,
    in_flight: AtomicBool,
}

/// Lookup maps built once per pass from the bulk fetches.
struct Lookups<'a> {
    lists: &'a [BoardList],
    list_name_by_id: HashMap<&'a str, &'a str>,
    list_id_by_name: HashMap<&'a str, &'a str>,
    field_id_by_name: HashMap<&'a str, &'a str>,
    card_by_id: HashMap<&'a str, &'a Card>,
    card_values: HashMap<&'a str, HashMap<String, FieldValue>>,
    page_by_card_id: HashMap<String, &'a Page>,
}

enum EntryOutcome {
    Created,
    Updated,
    Unchanged,
    Dangling,
}

impl<B: BoardService, D: DatabaseService> SyncEngine<B, D> {
    pub fn new(board: B, database: D) -> Self {
        Self {
            board,
            database,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Trigger-facing entry point. A pass already in flight drops the
    /// trigger (`Ok(None)`) rather than queueing a second pass.
    pub async fn try_sync(&self) -> Result<Option<SyncStats>> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!("reconciliation pass already in flight; trigger dropped");
            return Ok(None);
        }
        let result = self.perform_sync().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    /// Run one full reconciliation pass and return its statistics.
    #[instrument(skip_all)]
    pub async fn perform_sync(&self) -> Result<SyncStats> {
        let mut stats = SyncStats::default();

        let (cards, lists, field_defs, pages) = match tokio::try_join!(
            self.board.list_cards(),
            self.board.list_lists(),
            self.board.list_custom_fields(),
            self.database.list_entries(),
        ) {
            Ok(fetched) => fetched,
            Err(err) => {
                stats.errors += 1;
                warn!(?stats, "bulk fetch failed; aborting pass");
                return Err(err).context("bulk fetch failed");
            }
        };
        info!(
            cards = cards.len(),
            lists = lists.len(),
            fields = field_defs.len(),
            entries = pages.len(),
            "starting reconciliation pass"
        );

        let (unique_cards, lookups) = build_lookups(&cards, &lists, &field_defs, &pages);

        // Properties pushed to the database this pass, by page id. The
        // database→board pass reads through this overlay so both passes
        // observe one consistent state and a pass converges in one run.
        let mut pushed: HashMap<&str, Map<String, Value>> = HashMap::new();

        self.sync_cards_to_database(&unique_cards, &lookups, &mut pushed, &mut stats)
            .await;
        self.sync_entries_to_board(&pages, &lookups, &pushed, &mut stats)
            .await;
        self.apply_deletions(&unique_cards, &pages, &lookups, &mut stats)
            .await;

        info!(?stats, "reconciliation pass complete");
        Ok(stats)
    }

    /// Board→database: update the linked entry when a bridged field changed,
    /// create an entry for cards that have none. Cards already marked synced
    /// but missing their entry are deletion candidates, not creations.
    async fn sync_cards_to_database<'a>(
        &self,
        unique_cards: &[&'a Card],
        lk: &Lookups<'a>,
        pushed: &mut HashMap<&'a str, Map<String, Value>>,
        stats: &mut SyncStats,
    ) {
        for card in unique_cards {
            let values = &lk.card_values[card.id.as_str()];
            let list_name = lk.list_name_by_id.get(card.id_list.as_str()).copied();
            if list_name.is_none() {
                warn!(card_id = %card.id, list_id = %card.id_list, "card's list not found on board");
            }
            let props = mapper::to_notion_properties(card, values, list_name);
            match lk.page_by_card_id.get(card.id.as_str()) {
                Some(page) => {
                    if !page_needs_update(page, &props) {
                        continue;
                    }
                    match self.database.update_entry(&page.id, props.clone()).await {
                        Ok(()) => {
                            info!(card_id = %card.id, page_id = %page.id, "updated entry from card");
                            stats.trello_to_notion.updated += 1;
                            pushed.insert(page.id.as_str(), props);
                        }
                        Err(err) => {
                            warn!(card_id = %card.id, name = %card.name, ?err, "failed to update entry");
                            stats.errors += 1;
                        }
                    }
                }
                None if is_synced(values) => {
                    debug!(card_id = %card.id, "synced card without entry; leaving to the deletion pass");
                }
                None => match self.database.create_entry(props).await {
                    Ok(page) => {
                        info!(card_id = %card.id, page_id = %page.id, "created entry for card");
                        stats.trello_to_notion.created += 1;
                    }
                    Err(err) => {
                        warn!(card_id = %card.id, name = %card.name, ?err, "failed to create entry");
                        stats.errors += 1;
                    }
                },
            }
        }
    }

    /// Database→board: create cards for unlinked entries, reconcile linked
    /// ones, and propagate the database-authoritative derived fields.
    async fn sync_entries_to_board<'a>(
        &self,
        pages: &'a [Page],
        lk: &Lookups<'a>,
        pushed: &HashMap<&'a str, Map<String, Value>>,
        stats: &mut SyncStats,
    ) {
        for page in pages {
            let outcome = self
                .sync_entry_to_board(page, lk, pushed.get(page.id.as_str()))
                .await;
            match outcome {
                Ok(EntryOutcome::Created) => stats.notion_to_trello.created += 1,
                Ok(EntryOutcome::Updated) => stats.notion_to_trello.updated += 1,
                Ok(EntryOutcome::Unchanged) | Ok(EntryOutcome::Dangling) => {}
                Err(err) => {
                    warn!(page_id = %page.id, ?err, "failed to reconcile entry with board");
                    stats.errors += 1;
                }
            }
        }
    }

    async fn sync_entry_to_board<'a>(
        &self,
        page: &Page,
        lk: &Lookups<'a>,
        pushed: Option<&Map<String, Value>>,
    ) -> Result<EntryOutcome> {
        let card_ref = page.rich_text(CARD_ID_PROP).unwrap_or_default();
        let card_ref = card_ref.trim();
        if card_ref.is_empty() {
            return self.create_card_for_entry(page, lk).await;
        }
        let Some(card) = lk.card_by_id.get(card_ref) else {
            warn!(page_id = %page.id, card_id = %card_ref, "entry references a card that no longer exists; skipping");
            return Ok(EntryOutcome::Dangling);
        };
        self.update_card_from_entry(page, card, lk, pushed).await
    }

    async fn create_card_for_entry<'a>(
        &self,
        page: &Page,
        lk: &Lookups<'a>,
    ) -> Result<EntryOutcome> {
        let update = mapper::to_card_update(page);
        let name = update.name.unwrap_or_else(|| "Untitled".to_string());
        let department = page.select(DEPARTMENT_PROP);
        let list_id = match department
            .as_deref()
            .and_then(|d| lk.list_id_by_name.get(d).copied())
        {
            Some(id) => id,
            None => {
                let fallback = lk
                    .lists
                    .first()
                    .context("board has no lists to place a new card in")?;
                warn!(page_id = %page.id, department = ?department, list = %fallback.name, "no list matches entry department; using first list");
                fallback.id.as_str()
            }
        };

        let card = self
            .board
            .create_card(&name, list_id)
            .await
            .context("failed to create card for entry")?;
        info!(page_id = %page.id, card_id = %card.id, "created card for entry");

        let mut props = Map::new();
        props.insert(CARD_ID_PROP.to_string(), mapper::rich_text_prop(&card.id));
        self.database
            .update_entry(&page.id, props)
            .await
            .context("failed to write card id back to entry")?;

        if let Some(field_id) = lk.field_id_by_name.get(NOTION_LINK_FIELD) {
            let link = FieldValue::Text(mapper::page_permalink(&page.id));
            self.board
                .update_custom_field(&card.id, field_id, &link)
                .await
                .context("failed to set back-link field on new card")?;
        }
        Ok(EntryOutcome::Created)
    }

    async fn update_card_from_entry<'a>(
        &self,
        page: &Page,
        card: &Card,
        lk: &Lookups<'a>,
        pushed: Option<&Map<String, Value>>,
    ) -> Result<EntryOutcome> {
        // Entry state as of this pass: anything updated in the
        // board→database pass wins over the fetched snapshot, property by
        // property, mirroring the remote patch.
        let effective = |name: &str| -> Option<FieldValue> {
            pushed
                .and_then(|m| m.get(name))
                .or_else(|| page.prop(name))
                .and_then(prop_field_value)
        };
        let values = &lk.card_values[card.id.as_str()];
        let mut touched = false;

        let entry_title = effective(TITLE_PROP);
        let card_name = FieldValue::Text(card.name.clone());
        if mapper::values_differ(entry_title.as_ref(), Some(&card_name)) {
            if let Some(FieldValue::Text(title)) = &entry_title {
                self.board
                    .update_card(&card.id, title)
                    .await
                    .context("failed to update card title")?;
                touched = true;
            }
        }

        let entry_department = effective(DEPARTMENT_PROP);
        let current_list = lk
            .list_name_by_id
            .get(card.id_list.as_str())
            .map(|n| FieldValue::Text(n.to_string()));
        if mapper::values_differ(entry_department.as_ref(), current_list.as_ref()) {
            if let Some(FieldValue::Text(department)) = &entry_department {
                match lk.list_id_by_name.get(department.as_str()) {
                    Some(list_id) => {
                        self.board
                            .move_card(&card.id, list_id)
                            .await
                            .context("failed to move card")?;
                        touched = true;
                    }
                    None => {
                        warn!(page_id = %page.id, department = %department, "no list matches entry department; keeping card in place");
                    }
                }
            }
        }

        for field in SCORE_FIELDS {
            let theirs = effective(field);
            if !mapper::values_differ(theirs.as_ref(), values.get(field)) {
                continue;
            }
            let Some(value) = theirs else {
                // Card has a value the entry lacks; the board→database pass
                // owns that direction.
                continue;
            };
            match lk.field_id_by_name.get(field) {
                Some(field_id) => {
                    self.board
                        .update_custom_field(&card.id, field_id, &value)
                        .await
                        .with_context(|| format!("failed to update card field {}", field))?;
                    touched = true;
                }
                None => warn!(field, "custom field not defined on board; skipping"),
            }
        }

        // The synced marker is forced true once a pair reconciles; it arms
        // the deletion protocol for this card.
        let synced = FieldValue::Bool(true);
        if mapper::values_differ(Some(&synced), values.get(SYNCED_FIELD)) {
            match lk.field_id_by_name.get(SYNCED_FIELD) {
                Some(field_id) => {
                    self.board
                        .update_custom_field(&card.id, field_id, &synced)
                        .await
                        .context("failed to set synced marker on card")?;
                    touched = true;
                }
                None => warn!("synced marker field not defined on board"),
            }
        }

        // Derived total score: the database formula is authoritative,
        // pushed one-way using the already-fetched card state.
        if let Some(total) = page.formula_number(TOTAL_SCORE_FIELD) {
            let desired = FieldValue::Number(total);
            if mapper::values_differ(Some(&desired), values.get(TOTAL_SCORE_FIELD)) {
                match lk.field_id_by_name.get(TOTAL_SCORE_FIELD) {
                    Some(field_id) => {
                        self.board
                            .update_custom_field(&card.id, field_id, &desired)
                            .await
                            .context("failed to push total score to card")?;
                        touched = true;
                    }
                    None => warn!("total score field not defined on board; skipping"),
                }
            }
        }

        // Back-link to the entry, also database-authoritative.
        if let Some(field_id) = lk.field_id_by_name.get(NOTION_LINK_FIELD) {
            let link = FieldValue::Text(mapper::page_permalink(&page.id));
            if mapper::values_differ(Some(&link), values.get(NOTION_LINK_FIELD)) {
                self.board
                    .update_custom_field(&card.id, field_id, &link)
                    .await
                    .context("failed to push back-link to card")?;
                touched = true;
            }
        }

        Ok(if touched {
            EntryOutcome::Updated
        } else {
            EntryOutcome::Unchanged
        })
    }

    /// Deletion by convention: only records marked synced whose counterpart
    /// is confirmed absent are removed. Unsynced records are never
    /// candidates, so a transient fetch gap or a not-yet-linked record can
    /// never trigger a destructive delete.
    async fn apply_deletions<'a>(
        &self,
        unique_cards: &[&'a Card],
        pages: &'a [Page],
        lk: &Lookups<'a>,
        stats: &mut SyncStats,
    ) {
        for page in pages {
            if page.checkbox(SYNCED_FIELD) != Some(true) {
                continue;
            }
            let Some(card_ref) = page.rich_text(CARD_ID_PROP) else {
                continue;
            };
            let card_ref = card_ref.trim();
            if card_ref.is_empty() || lk.card_by_id.contains_key(card_ref) {
                continue;
            }
            match self.database.archive_entry(&page.id).await {
                Ok(()) => {
                    info!(page_id = %page.id, card_id = %card_ref, "archived entry whose card is gone");
                }
                Err(err) => {
                    warn!(page_id = %page.id, ?err, "failed to archive entry");
                    stats.errors += 1;
                }
            }
        }

        for card in unique_cards {
            let values = &lk.card_values[card.id.as_str()];
            if !is_synced(values) {
                continue;
            }
            if lk.page_by_card_id.contains_key(card.id.as_str()) {
                continue;
            }
            match self.board.delete_card(&card.id).await {
                Ok(()) => {
                    info!(card_id = %card.id, name = %card.name, "deleted card whose entry is gone");
                }
                Err(err) => {
                    warn!(card_id = %card.id, ?err, "failed to delete card");
                    stats.errors += 1;
                }
            }
        }
    }
}

/// Deduplicate cards by id (keep-first, logging each collision) and build
/// the per-pass lookup maps.
fn build_lookups<'a>(
    cards: &'a [Card],
    lists: &'a [BoardList],
    field_defs: &'a [CustomFieldDef],
    pages: &'a [Page],
) -> (Vec<&'a Card>, Lookups<'a>) {
    let mut unique_cards = Vec::with_capacity(cards.len());
    let mut card_by_id: HashMap<&str, &Card> = HashMap::new();
    for card in cards {
        if card_by_id.contains_key(card.id.as_str()) {
            warn!(card_id = %card.id, name = %card.name, "duplicate card id in board listing; keeping first occurrence");
            continue;
        }
        card_by_id.insert(card.id.as_str(), card);
        unique_cards.push(card);
    }

    let card_values = unique_cards
        .iter()
        .map(|c| (c.id.as_str(), mapper::extract_field_values(c, field_defs)))
        .collect();

    let mut page_by_card_id: HashMap<String, &Page> = HashMap::new();
    for page in pages {
        if let Some(card_id) = page.rich_text(CARD_ID_PROP) {
            let card_id = card_id.trim();
            if !card_id.is_empty() {
                page_by_card_id.entry(card_id.to_string()).or_insert(page);
            }
        }
    }

    let lookups = Lookups {
        lists,
        list_name_by_id: lists.iter().map(|l| (l.id.as_str(), l.name.as_str())).collect(),
        list_id_by_name: lists.iter().map(|l| (l.name.as_str(), l.id.as_str())).collect(),
        field_id_by_name: field_defs
            .iter()
            .map(|d| (d.name.as_str(), d.id.as_str()))
            .collect(),
        card_by_id,
        card_values,
        page_by_card_id,
    };
    (unique_cards, lookups)
}

/// Extract a comparable value from a single property, whichever variant it
/// holds. Works on both the query shapes and the shapes the mapper builds.
fn prop_field_value(v: &Value) -> Option<FieldValue> {
    if let Some(n) = prop::number(v) {
        return Some(FieldValue::Number(n));
    }
    if let Some(t) = prop::title(v) {
        return Some(FieldValue::Text(t));
    }
    if let Some(t) = prop::rich_text(v) {
        return Some(FieldValue::Text(t));
    }
    if let Some(s) = prop::select(v) {
        return Some(FieldValue::Text(s));
    }
    if let Some(b) = prop::checkbox(v) {
        return Some(FieldValue::Bool(b));
    }
    if let Some(n) = prop::formula_number(v) {
        return Some(FieldValue::Number(n));
    }
    None
}

/// True when any bridged field (title, department, score fields) differs
/// between the mapped card properties and the entry's current values.
fn page_needs_update(page: &Page, props: &Map<String, Value>) -> bool {
    let mut compared = vec![TITLE_PROP, DEPARTMENT_PROP];
    compared.extend(SCORE_FIELDS);
    compared.into_iter().any(|name| {
        let ours = props.get(name).and_then(prop_field_value);
        let theirs = page.prop(name).and_then(prop_field_value);
        mapper::values_differ(ours.as_ref(), theirs.as_ref())
    })
}

fn is_synced(values: &HashMap<String, FieldValue>) -> bool {
    values.get(SYNCED_FIELD) == Some(&FieldValue::Bool(true))
}
