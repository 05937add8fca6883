//! Pagination helpers for materializing complete remote collections.
//!
//! Two shapes exist in the wild here: Lemlist pages by offset and signals the
//! end with a short page; HubSpot pages by cursor and signals the end by
//! omitting the next-cursor. Both walkers insert a small courtesy delay
//! between page fetches — that delay is part of rate-limit compliance, not a
//! tuning knob.

use std::future::Future;
use std::time::Duration;

use super::ApiError;

/// One page of a cursor-paginated collection.
#[derive(Debug)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Walk an offset-paginated endpoint to completion.
///
/// `fetch_page` receives the next offset and returns one page. A page shorter
/// than `page_size` (including an empty one) is a definitive end-of-data
/// signal — there is no trailing empty-page probe.
pub async fn fetch_offset_pages<T, F, Fut>(
    page_size: usize,
    delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
        let page = fetch_page(offset).await?;
        let short = page.len() < page_size;
        all.extend(page);
        if short {
            break;
        }
        offset += page_size;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(all)
}

/// Walk a cursor-paginated endpoint to completion.
///
/// The cursor starts as `None` and is replaced by each page's next-cursor;
/// pagination stops when no next-cursor is returned. An empty first page
/// yields an empty collection without error.
pub async fn fetch_cursor_pages<T, F, Fut>(
    delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<CursorPage<T>, ApiError>>,
{
    let mut all = Vec::new();
    let mut cursor = None;

    loop {
        let page = fetch_page(cursor).await?;
        all.extend(page.items);
        match page.next {
            Some(next) => {
                cursor = Some(next);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            None => break,
        }
    }

    Ok(all)
}
