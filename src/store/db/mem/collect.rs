use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

use serde_json::Value as JsonValue;
use tracing::trace;

use crate::{
    LeadflowError, Result, ShareLock,
    store::{
        DbCollection, PageData,
        query::{Query, compare},
    },
};

use super::DbDocument;

/// In-memory collection keyed by record id.
pub struct Collect<T> {
    name: String,
    items: ShareLock<HashMap<String, T>>,
}

impl<T> fmt::Debug for Collect<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Collect").field("name", &self.name).finish()
    }
}

impl<T> Collect<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Clone + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("mem::{}::exists({})", self.name, id);
        Ok(self.items.read().unwrap().contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        trace!("mem::{}::find({})", self.name, id);
        self.items.read().unwrap().get(id).cloned().ok_or_else(|| LeadflowError::Store(format!("{} '{}' not found", self.name, id)))
    }

    fn query(
        &self,
        q: &Query,
    ) -> Result<PageData<Self::Item>> {
        trace!("mem::{}::query({:?})", self.name, q);
        let items = self.items.read().unwrap();
        let mut matched: Vec<(HashMap<String, JsonValue>, T)> = Vec::new();
        for item in items.values() {
            let doc = item.doc()?;
            if q.is_match(&doc) {
                matched.push((doc, item.clone()));
            }
        }

        matched.sort_by(|(a, _), (b, _)| {
            for (key, rev) in q.order_by() {
                let ord = match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                let ord = if *rev { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let count = matched.len();
        let rows = matched.into_iter().take(q.limit()).map(|(_, item)| item).collect::<Vec<_>>();
        Ok(PageData {
            count,
            page_size: q.limit(),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("mem::{}::create({})", self.name, data.id());
        let mut items = self.items.write().unwrap();
        if items.contains_key(data.id()) {
            return Err(LeadflowError::Store(format!("{} '{}' already exists", self.name, data.id())));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("mem::{}::update({})", self.name, data.id());
        let mut items = self.items.write().unwrap();
        match items.get_mut(data.id()) {
            Some(item) => {
                *item = data.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("mem::{}::delete({})", self.name, id);
        Ok(self.items.write().unwrap().remove(id).is_some())
    }
}
