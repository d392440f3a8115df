use std::collections::BTreeSet;

use super::drm::RemoveDrm;
use super::fetch::FetchAcsm;
use super::kfx2epub::KfxToEpub;
use super::none::ComputeMetadata;
use super::pdf::ReformatPdf;
use super::print::PrintMetadata;
use super::rename::RenameBook;
use super::{Action, ActionId};

/// Every action, held in canonical order.
pub struct ActionRegistry {
    actions: Vec<Box<dyn Action>>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|a| a.id()))
            .finish()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    /// Registry with the built-in actions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_actions(vec![
            Box::new(FetchAcsm),
            Box::new(RemoveDrm),
            Box::new(KfxToEpub),
            Box::new(RenameBook),
            Box::new(ReformatPdf),
            Box::new(PrintMetadata),
            Box::new(ComputeMetadata),
        ])
    }

    /// Registry over `actions`, sorted into canonical order.
    #[must_use]
    pub fn with_actions(mut actions: Vec<Box<dyn Action>>) -> Self {
        actions.sort_by_key(|a| a.id());
        actions.dedup_by_key(|a| a.id());
        Self { actions }
    }

    /// Look up an action by identifier.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|a| a.id() == id)
            .map(|a| &**a)
    }

    /// All actions in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Action> {
        self.actions.iter().map(|a| &**a)
    }

    /// The requested subset, in canonical order regardless of how
    /// `requested` is ordered. Duplicates collapse.
    #[must_use]
    pub fn plan(&self, requested: &[ActionId]) -> Vec<&dyn Action> {
        let wanted: BTreeSet<ActionId> = requested.iter().copied().collect();
        self.iter().filter(|a| wanted.contains(&a.id())).collect()
    }
}

/// The effective action set: caller override, then config, then
/// [`ActionId::DEFAULT`]. An empty list counts as unspecified.
#[must_use]
pub fn effective_actions(caller: &[ActionId], config: Option<&[ActionId]>) -> Vec<ActionId> {
    if !caller.is_empty() {
        return caller.to_vec();
    }
    match config {
        Some(actions) if !actions.is_empty() => actions.to_vec(),
        _ => vec![ActionId::DEFAULT],
    }
}
