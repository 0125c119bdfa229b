//! Purpose: Decide whether a sheet title maps to an existing sheet or a new one.
//! Exports: `Resolution`, `resolve`, `resolve_with`, `MAX_SHEET_ID`.
//! Role: Pure decision step for the upsert paster; no network calls.
//! Invariants: Title matching is exact and case-sensitive.
//! Invariants: New sheet IDs lie in `[0, MAX_SHEET_ID]` and avoid IDs in the given metadata.

use super::error::{Error, ErrorKind};
use super::model::{SheetDescriptor, SpreadsheetMeta};

pub const MAX_SHEET_ID: i32 = i32::MAX;
const MAX_ID_DRAWS: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Existing(SheetDescriptor),
    Create { title: String, sheet_id: i32 },
}

impl Resolution {
    pub fn sheet_id(&self) -> i32 {
        match self {
            Resolution::Existing(sheet) => sheet.sheet_id,
            Resolution::Create { sheet_id, .. } => *sheet_id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Resolution::Create { .. })
    }
}

pub fn resolve(meta: &SpreadsheetMeta, title: &str) -> Result<Resolution, Error> {
    resolve_with(meta, title, || {
        getrandom::u32().map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to draw a random sheet id")
                .with_source(err)
        })
    })
}

/// Like [`resolve`], with the raw 32-bit draws supplied by the caller.
pub fn resolve_with<F>(meta: &SpreadsheetMeta, title: &str, mut draw: F) -> Result<Resolution, Error>
where
    F: FnMut() -> Result<u32, Error>,
{
    if let Some(sheet) = meta.sheet_by_title(title) {
        return Ok(Resolution::Existing(sheet.clone()));
    }
    for _ in 0..MAX_ID_DRAWS {
        let sheet_id = (draw()? & MAX_SHEET_ID as u32) as i32;
        if !meta.has_sheet_id(sheet_id) {
            return Ok(Resolution::Create {
                title: title.to_string(),
                sheet_id,
            });
        }
    }
    Err(Error::new(ErrorKind::Internal)
        .with_message("could not find an unused sheet id")
        .with_spreadsheet(meta.spreadsheet_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::{MAX_SHEET_ID, Resolution, resolve, resolve_with};
    use crate::core::error::ErrorKind;
    use crate::core::model::{SheetDescriptor, SpreadsheetMeta};

    fn meta(sheets: &[(i32, &str)]) -> SpreadsheetMeta {
        SpreadsheetMeta {
            spreadsheet_id: "doc".to_string(),
            title: "Doc".to_string(),
            locale: None,
            time_zone: None,
            sheets: sheets
                .iter()
                .enumerate()
                .map(|(index, (sheet_id, title))| SheetDescriptor {
                    sheet_id: *sheet_id,
                    title: title.to_string(),
                    index: index as i32,
                    row_count: 1000,
                    column_count: 26,
                })
                .collect(),
        }
    }

    #[test]
    fn existing_title_keeps_its_id() {
        let meta = meta(&[(0, "Sheet1"), (812, "Data")]);
        let resolution = resolve(&meta, "Data").expect("resolve");
        assert!(!resolution.is_new());
        assert_eq!(resolution.sheet_id(), 812);
    }

    #[test]
    fn title_match_is_case_sensitive() {
        let meta = meta(&[(812, "Data")]);
        let resolution = resolve(&meta, "data").expect("resolve");
        assert!(resolution.is_new());
    }

    #[test]
    fn new_ids_are_non_negative() {
        let meta = meta(&[]);
        let resolution = resolve_with(&meta, "New", || Ok(u32::MAX)).expect("resolve");
        assert_eq!(
            resolution,
            Resolution::Create {
                title: "New".to_string(),
                sheet_id: MAX_SHEET_ID,
            }
        );
        for _ in 0..64 {
            let id = resolve(&meta, "New").expect("resolve").sheet_id();
            assert!(id >= 0);
        }
    }

    #[test]
    fn colliding_draws_are_redrawn() {
        let meta = meta(&[(5, "Sheet1"), (9, "Sheet2")]);
        let mut draws = vec![5u32, 9, 42].into_iter();
        let resolution =
            resolve_with(&meta, "Fresh", || Ok(draws.next().expect("draw"))).expect("resolve");
        assert_eq!(resolution.sheet_id(), 42);
    }

    #[test]
    fn exhausted_draws_fail_without_proposing_an_id() {
        let meta = meta(&[(5, "Sheet1")]);
        let err = resolve_with(&meta, "Fresh", || Ok(5)).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
