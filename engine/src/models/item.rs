//! Item (NFT) model.

use serde::{Deserialize, Serialize};

use crate::ids::{CollectionId, ItemId};

/// A uniquely identified, non-fungible tradable object.
///
/// `value_hint` is an optional, caller-supplied price signal (spec's
/// `PriceSource`/`MetadataSource` adapters feed this in); the engine never
/// fetches it itself and treats a missing hint as scoring-neutral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub collection_id: Option<CollectionId>,
    pub value_hint: Option<f64>,
}

impl Item {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            collection_id: None,
            value_hint: None,
        }
    }

    pub fn with_collection(mut self, collection_id: CollectionId) -> Self {
        self.collection_id = Some(collection_id);
        self
    }

    pub fn with_value_hint(mut self, value_hint: f64) -> Self {
        self.value_hint = Some(value_hint);
        self
    }
}
