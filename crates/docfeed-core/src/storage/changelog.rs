//! Per-collection change log.
//!
//! Every mutation appends one record to the collection's change tree, keyed by
//! a big-endian per-collection sequence number so that key order equals commit
//! order. Records beyond the retention window are pruned from the front.

use serde::{Deserialize, Serialize};
use sled::Tree;

use crate::document::{ChangeEvent, Document};
use crate::error::{Error, Result};

/// Native change record as stored in the change tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub old_val: Option<Document>,
    pub new_val: Option<Document>,
}

impl ChangeRecord {
    pub fn insert(doc: Document) -> Self {
        Self {
            old_val: None,
            new_val: Some(doc),
        }
    }

    pub fn update(old: Document, new: Document) -> Self {
        Self {
            old_val: Some(old),
            new_val: Some(new),
        }
    }

    pub fn delete(old: Document) -> Self {
        Self {
            old_val: Some(old),
            new_val: None,
        }
    }
}

impl From<ChangeRecord> for ChangeEvent {
    fn from(record: ChangeRecord) -> Self {
        ChangeEvent {
            previous_value: record.old_val,
            new_value: record.new_val,
        }
    }
}

/// Encode a sequence number as a change tree key.
pub(crate) fn seq_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

/// Sequence number the next record appended to `tree` should use.
///
/// Sequences start at 1 and continue after the newest surviving record.
pub(crate) fn next_seq(tree: &Tree) -> Result<u64> {
    let Some((key, _)) = tree.last()? else {
        return Ok(1);
    };
    let bytes: [u8; 8] = key[..]
        .try_into()
        .map_err(|_| Error::Corrupted(format!("change log key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes) + 1)
}

/// Append a record and prune everything older than `retention` records.
pub(crate) fn append(tree: &Tree, seq: u64, record: &ChangeRecord, retention: usize) -> Result<()> {
    let value = serde_json::to_vec(record)?;
    tree.insert(seq_key(seq), value)?;

    let retention = retention as u64;
    if seq >= retention {
        let cutoff = seq_key(seq + 1 - retention);
        for entry in tree.range(..cutoff) {
            let (key, _) = entry?;
            tree.remove(key)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_tree() -> (sled::Db, Tree) {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let tree = db.open_tree("changes:test").unwrap();
        (db, tree)
    }

    #[test]
    fn test_append_orders_by_seq() {
        let (_db, tree) = temp_tree();
        append(&tree, 2, &ChangeRecord::insert(Document::new("b")), 10).unwrap();
        append(&tree, 10, &ChangeRecord::insert(Document::new("c")), 10).unwrap();

        let keys: Vec<u64> = tree
            .iter()
            .keys()
            .map(|k| {
                let k = k.unwrap();
                u64::from_be_bytes(k[..].try_into().unwrap())
            })
            .collect();
        assert_eq!(keys, vec![2, 10]);
    }

    #[test]
    fn test_append_prunes_outside_retention() {
        let (_db, tree) = temp_tree();
        for seq in 1..=5 {
            append(&tree, seq, &ChangeRecord::insert(Document::new("a")), 2).unwrap();
        }
        assert_eq!(tree.len(), 2);
        assert!(tree.get(seq_key(4)).unwrap().is_some());
        assert!(tree.get(seq_key(5)).unwrap().is_some());
    }

    #[test]
    fn test_next_seq_continues_after_last_record() {
        let (_db, tree) = temp_tree();
        assert_eq!(next_seq(&tree).unwrap(), 1);

        append(&tree, 1, &ChangeRecord::insert(Document::new("a")), 10).unwrap();
        append(&tree, 2, &ChangeRecord::insert(Document::new("b")), 10).unwrap();
        assert_eq!(next_seq(&tree).unwrap(), 3);

        tree.insert(b"bad", b"{}".to_vec()).unwrap();
        assert!(matches!(next_seq(&tree), Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_record_json_shape() {
        let record = ChangeRecord::delete(Document::new("a"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["old_val"]["name"], "a");
        assert!(json["new_val"].is_null());

        let event: ChangeEvent = record.into();
        assert!(event.new_value.is_none());
    }
}
