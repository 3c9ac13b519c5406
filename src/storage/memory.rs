//! In-memory handles for both collaborator interfaces.
//!
//! Useful for tests and for callers that want the storage round trip
//! (WKT/JSON or document flattening) without a database.

use super::document::DocumentHandle;
use super::relational::{RelationalHandle, SqlParams, SqlRow};
use crate::error::{MapError, Result};
use crate::item::{ExternalId, PropertyMap};
use std::collections::BTreeMap;

/// Table keyed by auto-incrementing integer ids.
#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: BTreeMap<i64, SqlParams>,
    next_id: i64,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn key(id: &ExternalId) -> Result<i64> {
        match id {
            ExternalId::Int(key) => Ok(*key),
            ExternalId::Text(text) => Err(MapError::Backend(format!(
                "table ids are integers, got '{}'",
                text
            ))),
        }
    }
}

impl RelationalHandle for MemoryTable {
    fn insert(&mut self, params: &SqlParams) -> Result<ExternalId> {
        self.next_id += 1;
        self.rows.insert(self.next_id, params.clone());
        Ok(ExternalId::Int(self.next_id))
    }

    fn update(&mut self, id: &ExternalId, params: &SqlParams) -> Result<()> {
        match self.rows.get_mut(&Self::key(id)?) {
            Some(row) => {
                *row = params.clone();
                Ok(())
            }
            None => Err(MapError::Backend(format!("no row with id {}", id))),
        }
    }

    fn delete(&mut self, id: &ExternalId) -> Result<()> {
        self.rows
            .remove(&Self::key(id)?)
            .map(|_| ())
            .ok_or_else(|| MapError::Backend(format!("no row with id {}", id)))
    }

    fn select_all(&self) -> Result<Vec<SqlRow>> {
        Ok(self
            .rows
            .iter()
            .map(|(id, params)| SqlRow {
                id: ExternalId::Int(*id),
                geometry: params.wkt.clone(),
                properties: Some(params.properties.clone()),
            })
            .collect())
    }
}

/// Collection keyed by generated string ids, kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    documents: Vec<(ExternalId, PropertyMap)>,
    counter: u64,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn position(&self, id: &ExternalId) -> Result<usize> {
        self.documents
            .iter()
            .position(|(existing, _)| existing == id)
            .ok_or_else(|| MapError::Backend(format!("no document with id {}", id)))
    }
}

impl DocumentHandle for MemoryCollection {
    fn insert(&mut self, document: &PropertyMap) -> Result<ExternalId> {
        self.counter += 1;
        let id = ExternalId::Text(format!("{:024x}", self.counter));
        self.documents.push((id.clone(), document.clone()));
        Ok(id)
    }

    fn replace(&mut self, id: &ExternalId, document: &PropertyMap) -> Result<()> {
        let idx = self.position(id)?;
        self.documents[idx].1 = document.clone();
        Ok(())
    }

    fn remove(&mut self, id: &ExternalId) -> Result<()> {
        let idx = self.position(id)?;
        self.documents.remove(idx);
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<PropertyMap>> {
        Ok(self
            .documents
            .iter()
            .map(|(id, document)| {
                let mut stored = PropertyMap::new();
                stored.insert(super::document::ID_KEY.to_string(), id.to_string().into());
                stored.extend(document.iter().map(|(k, v)| (k.clone(), v.clone())));
                stored
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(wkt: &str) -> SqlParams {
        SqlParams {
            wkt: wkt.to_string(),
            properties: "{}".to_string(),
        }
    }

    #[test]
    fn test_table_ids_increment() {
        let mut table = MemoryTable::new();
        assert_eq!(table.insert(&params("POINT(0 0)")).unwrap(), ExternalId::Int(1));
        assert_eq!(table.insert(&params("POINT(1 1)")).unwrap(), ExternalId::Int(2));
        table.delete(&ExternalId::Int(1)).unwrap();
        assert_eq!(table.insert(&params("POINT(2 2)")).unwrap(), ExternalId::Int(3));
        assert_eq!(table.select_all().unwrap().len(), 2);
    }

    #[test]
    fn test_table_rejects_unknown_ids() {
        let mut table = MemoryTable::new();
        assert!(matches!(
            table.update(&ExternalId::Int(9), &params("POINT(0 0)")),
            Err(MapError::Backend(_))
        ));
        assert!(matches!(
            table.delete(&ExternalId::from("abc")),
            Err(MapError::Backend(_))
        ));
    }

    #[test]
    fn test_collection_stamps_ids() {
        let mut collection = MemoryCollection::new();
        let id = collection.insert(&PropertyMap::new()).unwrap();
        let stored = collection.find_all().unwrap();
        assert_eq!(
            stored[0].get(super::super::document::ID_KEY),
            Some(&id.to_string().into())
        );
    }
}
