//! Catalog against change-cache comparison.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// What has to happen to one object key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// In the catalog but not synchronized: upload it.
    Add,
    /// Synchronized but gone from the catalog: delete it.
    Remove,
    /// Synchronized, but the catalog content changed: upload it again.
    ///
    /// Reserved. [`diff`] compares keys only and never produces it, and the
    /// sync worker skips it.
    Update,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Remove => f.write_str("remove"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// Compare the catalog's keys with the keys already synchronized.
///
/// Every catalog key missing from `synchronized` yields [`SyncAction::Add`],
/// every synchronized key missing from the catalog yields
/// [`SyncAction::Remove`]. Keys in both are omitted. Actions come out in key
/// order with adds and removes interleaved. Duplicate catalog keys count once.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use prism_sync::{SyncAction, diff};
///
/// let synchronized: BTreeSet<String> = ["A", "B", "D"].map(String::from).into();
/// let actions = diff(["A", "B", "C"], &synchronized);
/// assert_eq!(
///     actions,
///     vec![("C".to_owned(), SyncAction::Add), ("D".to_owned(), SyncAction::Remove)]
/// );
/// ```
pub fn diff<I, S>(catalog_keys: I, synchronized: &BTreeSet<String>) -> Vec<(String, SyncAction)>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let catalog: BTreeSet<String> = catalog_keys.into_iter().map(Into::into).collect();

    let mut actions = Vec::new();
    let mut ours = catalog.into_iter().peekable();
    let mut theirs = synchronized.iter().peekable();

    loop {
        let order = match (ours.peek(), theirs.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.as_str().cmp(b.as_str()),
        };
        match order {
            Ordering::Less => {
                if let Some(key) = ours.next() {
                    actions.push((key, SyncAction::Add));
                }
            }
            Ordering::Greater => {
                if let Some(key) = theirs.next() {
                    actions.push((key.clone(), SyncAction::Remove));
                }
            }
            Ordering::Equal => {
                ours.next();
                theirs.next();
            }
        }
    }

    actions
}
