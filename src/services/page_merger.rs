//! Page merger for "fetch more" pagination.
//!
//! Combines the list accumulated so far with a newly fetched page. Order is
//! append-only; the server decides order within a page and is trusted not to
//! repeat items across pages, so no deduplication happens here.

use crate::error::AppError;
use crate::models::page::{AccumulatedList, Page};

/// Merge a fetched page into the accumulated list.
///
/// # Arguments
/// * `previous` - List accumulated so far, `None` for the first page
/// * `incoming` - Newly fetched page
///
/// # Returns
/// The combined list. The incoming page's metadata always replaces the
/// previous metadata, except for an empty incoming page, which leaves the
/// previous list as it was. A malformed page is rejected before anything
/// is combined.
pub fn merge<T: Clone>(
    previous: Option<&AccumulatedList<T>>,
    incoming: Page<T>,
) -> Result<AccumulatedList<T>, AppError> {
    incoming.validate()?;

    let Some(previous) = previous else {
        log::debug!(
            "[merge] First page: {} items, hasNextPage={}",
            incoming.items.len(),
            incoming.page_info.has_next_page
        );
        return Ok(AccumulatedList::from_page(incoming));
    };

    if incoming.is_empty() {
        log::warn!(
            "[merge] Ignoring empty page, keeping {} accumulated items",
            previous.len()
        );
        return Ok(previous.clone());
    }

    if !previous.page_info.has_next_page && incoming.page_info.has_next_page {
        log::debug!("[merge] Incoming page reopened pagination after a final page");
    }

    let mut items = Vec::with_capacity(previous.len() + incoming.items.len());
    items.extend(previous.items.iter().cloned());
    items.extend(incoming.items);

    log::debug!(
        "[merge] Appended page: {} items total, hasNextPage={}",
        items.len(),
        incoming.page_info.has_next_page
    );

    Ok(AccumulatedList {
        items,
        page_info: incoming.page_info,
    })
}
