//! The log fetcher: drains the paginated interaction-record query.

use crate::core::{InteractionRecord, TxId};

use super::{Gateway, GatewayError, PageRequest};

/// Fetch every interaction record referencing `contract` in the block
/// range `[min_height, max_height]`, following the cursor until the query
/// reports no further pages. Records that are nested outputs of bundled
/// parent transactions are excluded. Any page failure aborts the whole
/// fetch; there is no partial result.
///
/// The returned list is in gateway order (ascending height) but not yet
/// in canonical sort-key order; ordering is the replay engine's job.
pub fn fetch_interactions(
    gateway: &dyn Gateway,
    contract: &TxId,
    min_height: u64,
    max_height: u64,
    page_size: usize,
) -> Result<Vec<InteractionRecord>, GatewayError> {
    let mut records = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    let mut bundled = 0usize;

    loop {
        let page = gateway.interactions_page(&PageRequest {
            contract: contract.clone(),
            min_height,
            max_height,
            page_size,
            cursor: cursor.clone(),
        })?;
        pages += 1;

        let last_cursor = page.edges.last().map(|edge| edge.cursor.clone());
        for edge in page.edges {
            if edge.parent.is_some() {
                bundled += 1;
                continue;
            }
            records.push(edge.record);
        }

        if !page.has_next_page {
            break;
        }
        match last_cursor {
            Some(c) => cursor = Some(c),
            // A continuation signal without edges would loop forever on
            // the same cursor; treat it as a malformed response.
            None => {
                return Err(GatewayError::Protocol {
                    reason: "page reported a next page but carried no edges".into(),
                });
            }
        }
    }

    tracing::debug!(
        contract = %contract,
        min_height,
        max_height,
        pages,
        records = records.len(),
        bundled_excluded = bundled,
        "interaction log fetched"
    );

    Ok(records)
}
