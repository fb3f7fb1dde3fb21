//! Administrative repertoire operations: copy, move, delete.


use crate::repertoire::{Repertoire, RepertoireSpec};
use crate::store::RepertoireStore;
use crate::tsv::{self, ReceiveOptions, ReceiveOutcome};
use color_eyre::eyre::{Report, Result};
use log::warn;

// ----------------------------------------------------------------------------
// MoveCopyParams

#[derive(Clone, Debug)]
pub struct MoveCopyParams {
    pub from: RepertoireSpec,
    pub to: RepertoireSpec,
}

impl std::fmt::Display for MoveCopyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

// ----------------------------------------------------------------------------
// Operations

/// Copy a repertoire to another user/context/name, carrying its summary
/// metadata along.
pub fn copy_repertoire(
    store: &dyn RepertoireStore,
    params: &MoveCopyParams,
) -> Result<ReceiveOutcome, Report> {
    let repertoires = store.context_repertoires(&params.from.user_id, &params.from.context)?;
    let source = Repertoire::find(&repertoires, &params.from.name)
        .ok_or_else(|| color_eyre::eyre::eyre!("Repertoire {} not found", params.from))?;

    let options = ReceiveOptions {
        date: source.date,
        total_cells: Some(source.total_cells),
        total_milliliters: Some(source.total_milliliters),
    };

    let input = store.open_repertoire(&params.from)?;
    tsv::receive(input, store, &params.to, &options)
}

/// Copy, then delete the source. Returns false when the copy hit an
/// existing name or the delete failed.
pub fn move_repertoire(
    store: &dyn RepertoireStore,
    params: &MoveCopyParams,
) -> Result<bool, Report> {
    match copy_repertoire(store, params)? {
        ReceiveOutcome::Exists => Ok(false),
        ReceiveOutcome::Received(_) => {
            let deleted = store.delete_repertoire(&params.from)?;
            if !deleted {
                warn!("copied repertoire ok but failed delete ({params})");
            }
            Ok(deleted)
        }
    }
}

/// Remove a repertoire and everything cached for it.
pub fn delete_repertoire(
    store: &dyn RepertoireStore,
    spec: &RepertoireSpec,
) -> Result<bool, Report> {
    store.delete_repertoire(spec)
}
