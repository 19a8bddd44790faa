//! Asset loading errors.

use crate::asset_cache::AssetId;

/// Why an asset could not be produced.
///
/// `Clone` because one failed load is reported to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetLoadError {
    /// The loader does not know the asset.
    #[error("asset not found: {id}")]
    NotFound {
        /// Requested asset.
        id: AssetId,
    },

    /// The loader knows the asset but could not instantiate it.
    #[error("failed to load asset {id}: {reason}")]
    Failed {
        /// Requested asset.
        id: AssetId,
        /// Loader-provided description.
        reason: String,
    },

    /// The loading task ended without publishing a result.
    #[error("load of asset {0} was abandoned")]
    Abandoned(AssetId),
}
