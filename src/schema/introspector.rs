//! Catalog introspection.
//!
//! Reads the `_vspace` system view in one bounded select and decodes the user
//! spaces it lists.

use rmpv::Value;
use tracing::{debug, warn};

use super::{SpaceDescriptor, MIN_SPACE_TUPLE_LEN, NAME_POSITION, SYSTEM_SPACE_PREFIX};
use crate::db::EngineClient;
use crate::error::Result;

/// Id of the `_vspace` system view.
pub const VSPACE_ID: u32 = 281;

/// Id of the primary index of any space.
pub const PRIMARY_INDEX_ID: u32 = 0;

/// Maximum number of catalog tuples fetched. Larger catalogs are truncated.
pub const DEFAULT_CATALOG_LIMIT: u32 = 1000;

/// Lists the user spaces of a target over an open client.
pub struct SchemaIntrospector<'a> {
    client: &'a mut dyn EngineClient,
    limit: u32,
}

impl<'a> SchemaIntrospector<'a> {
    pub fn new(client: &'a mut dyn EngineClient) -> Self {
        Self {
            client,
            limit: DEFAULT_CATALOG_LIMIT,
        }
    }

    /// Overrides the catalog tuple cap.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Fetches the catalog and returns user spaces in catalog order.
    pub async fn get_schema(self) -> Result<Vec<SpaceDescriptor>> {
        let tuples = self
            .client
            .select(VSPACE_ID, PRIMARY_INDEX_ID, self.limit)
            .await?;

        if tuples.len() >= self.limit as usize {
            warn!(
                "Catalog returned {} tuples, the limit; later spaces are not listed",
                tuples.len()
            );
        }

        Ok(decode_catalog(&tuples))
    }
}

/// Decodes raw catalog tuples.
///
/// Entries that are not arrays, are shorter than `MIN_SPACE_TUPLE_LEN` or do
/// not decode are skipped, as are system spaces.
pub fn decode_catalog(tuples: &[Value]) -> Vec<SpaceDescriptor> {
    let mut spaces = Vec::with_capacity(tuples.len());

    for raw in tuples {
        let fields = match raw.as_array() {
            Some(fields) if fields.len() >= MIN_SPACE_TUPLE_LEN => fields,
            _ => {
                debug!("Skipping incomplete catalog entry: {raw}");
                continue;
            }
        };

        if let Some(name) = fields[NAME_POSITION].as_str() {
            if name.starts_with(SYSTEM_SPACE_PREFIX) {
                continue;
            }
        }

        match SpaceDescriptor::from_tuple(fields) {
            Ok(space) if space.is_system() => {}
            Ok(space) => spaces.push(space),
            Err(e) => warn!("Skipping malformed catalog entry {raw}: {e}"),
        }
    }

    spaces
}
