// src/table.rs
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::DisplayRow;

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Amount,
    From,
    Sender,
    Receiver,
    BlockHeight,
    BlockTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub sort: Option<Column>,
    pub dir: Option<SortDir>,
}

/// One page in the shape tabulator's remote pagination expects
#[derive(Debug, Clone, Serialize)]
pub struct TablePage {
    pub page: usize,
    pub page_size: usize,
    pub last_page: usize,
    pub total_rows: usize,
    pub data: Vec<DisplayRow>,
}

fn compare(a: &DisplayRow, b: &DisplayRow, column: Column) -> Ordering {
    match column {
        Column::Id => a.id.cmp(&b.id),
        Column::Amount => a.raw_amount.cmp(&b.raw_amount),
        Column::From => a.from.cmp(&b.from),
        Column::Sender => a.sender.cmp(&b.sender),
        Column::Receiver => a.receiver.cmp(&b.receiver),
        Column::BlockHeight => a.block_height.cmp(&b.block_height),
        Column::BlockTime => a.raw_block_time.cmp(&b.raw_block_time),
    }
}

/// Sort (stable; remote order when unsorted) and slice out one page.
/// Out-of-range pages are clamped to the last page.
pub fn render_page(rows: &[DisplayRow], query: &TableQuery) -> TablePage {
    let mut ordered: Vec<&DisplayRow> = rows.iter().collect();
    if let Some(column) = query.sort {
        match query.dir.unwrap_or_default() {
            SortDir::Asc => ordered.sort_by(|a, b| compare(a, b, column)),
            SortDir::Desc => ordered.sort_by(|a, b| compare(b, a, column)),
        }
    }

    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let total_rows = ordered.len();
    let last_page = total_rows.div_ceil(page_size).max(1);
    let page = query.page.unwrap_or(1).clamp(1, last_page);

    let data = ordered
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    TablePage {
        page,
        page_size,
        last_page,
        total_rows,
        data,
    }
}
