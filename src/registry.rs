// ===============================
// src/registry.rs (active order registry)
// ===============================
//
// In-process map order_id -> TrackedOrder. Tidak persist; hilang saat proses exit.
// Entri untuk satu pair diganti setiap pair itu di-refresh.
//
use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};

use crate::domain::TrackedOrder;
use crate::metrics::ACTIVE_ORDERS;

#[derive(Debug, Default)]
pub struct OrderRegistry {
    orders: HashMap<String, TrackedOrder>,
}

impl OrderRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, order: TrackedOrder) {
        self.orders.insert(order.order_id.clone(), order);
        ACTIVE_ORDERS.set(self.orders.len() as i64);
    }

    pub fn remove(&mut self, order_id: &str) -> Option<TrackedOrder> {
        let out = self.orders.remove(order_id);
        ACTIVE_ORDERS.set(self.orders.len() as i64);
        out
    }

    #[cfg(test)]
    pub fn contains(&self, order_id: &str) -> bool { self.orders.contains_key(order_id) }

    #[cfg(test)]
    pub fn get(&self, order_id: &str) -> Option<&TrackedOrder> { self.orders.get(order_id) }

    /// Ids for one pair, oldest first
    pub fn ids_for_pair(&self, pair: &str) -> Vec<String> {
        let mut v: Vec<&TrackedOrder> = self.orders.values().filter(|o| o.pair == pair).collect();
        v.sort_by_key(|o| o.created_at);
        v.into_iter().map(|o| o.order_id.clone()).collect()
    }

    pub fn all_ids(&self) -> Vec<String> {
        let mut v: Vec<&TrackedOrder> = self.orders.values().collect();
        v.sort_by(|a, b| a.pair.cmp(&b.pair).then(a.created_at.cmp(&b.created_at)));
        v.into_iter().map(|o| o.order_id.clone()).collect()
    }

    /// Umur order tertua; dipakai untuk log kalau ada order yang gagal di-cancel
    pub fn oldest(&self) -> Option<DateTime<Utc>> { self.orders.values().map(|o| o.created_at).min() }

    pub fn len(&self) -> usize { self.orders.len() }

    pub fn is_empty(&self) -> bool { self.orders.is_empty() }
}
