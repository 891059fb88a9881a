//! In-process cache store with Redis list semantics. Used for tests and
//! single-node runs without a Redis server.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CacheError, CacheKey, CacheStore, KeyPattern};

#[derive(Debug, Clone)]
enum Entry {
    Scalar(String),
    Hash(BTreeMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

/// Resolve a Redis-style inclusive range to `[start, end)` over `len` items.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start >= len || start > stop || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize + 1))
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn list_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    wire: &str,
) -> Result<&'a mut VecDeque<String>, CacheError> {
    match entries
        .entry(wire.to_string())
        .or_insert_with(|| Entry::List(VecDeque::new()))
    {
        Entry::List(list) => Ok(list),
        _ => Err(CacheError::WrongType(wire.to_string())),
    }
}

fn hash_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    wire: &str,
) -> Result<&'a mut BTreeMap<String, String>, CacheError> {
    match entries
        .entry(wire.to_string())
        .or_insert_with(|| Entry::Hash(BTreeMap::new()))
    {
        Entry::Hash(hash) => Ok(hash),
        _ => Err(CacheError::WrongType(wire.to_string())),
    }
}

fn list_ref<'a>(
    entries: &'a HashMap<String, Entry>,
    wire: &str,
) -> Result<Option<&'a VecDeque<String>>, CacheError> {
    match entries.get(wire) {
        None => Ok(None),
        Some(Entry::List(list)) => Ok(Some(list)),
        Some(_) => Err(CacheError::WrongType(wire.to_string())),
    }
}

fn hash_ref<'a>(
    entries: &'a HashMap<String, Entry>,
    wire: &str,
) -> Result<Option<&'a BTreeMap<String, String>>, CacheError> {
    match entries.get(wire) {
        None => Ok(None),
        Some(Entry::Hash(hash)) => Ok(Some(hash)),
        Some(_) => Err(CacheError::WrongType(wire.to_string())),
    }
}

/// Drop empty containers, as Redis does.
fn prune(entries: &mut HashMap<String, Entry>, wire: &str) {
    let empty = match entries.get(wire) {
        Some(Entry::List(list)) => list.is_empty(),
        Some(Entry::Hash(hash)) => hash.is_empty(),
        _ => false,
    };
    if empty {
        entries.remove(wire);
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let wire = key.to_string();
        let entries = self.entries.lock().await;
        match entries.get(&wire) {
            None => Ok(None),
            Some(Entry::Scalar(value)) => Ok(Some(value.clone())),
            Some(_) => Err(CacheError::WrongType(wire)),
        }
    }

    async fn set(&self, key: &CacheKey, value: String) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Entry::Scalar(value));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(&key.to_string()).is_some())
    }

    async fn hget(&self, key: &CacheKey, field: &str) -> Result<Option<String>, CacheError> {
        let wire = key.to_string();
        let entries = self.entries.lock().await;
        Ok(hash_ref(&entries, &wire)?.and_then(|hash| hash.get(field).cloned()))
    }

    async fn hset(&self, key: &CacheKey, fields: Vec<(String, String)>) -> Result<(), CacheError> {
        if fields.is_empty() {
            return Ok(());
        }
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        let hash = hash_mut(&mut entries, &wire)?;
        hash.extend(fields);
        Ok(())
    }

    async fn hgetall(&self, key: &CacheKey) -> Result<BTreeMap<String, String>, CacheError> {
        let wire = key.to_string();
        let entries = self.entries.lock().await;
        Ok(hash_ref(&entries, &wire)?.cloned().unwrap_or_default())
    }

    async fn hdel(&self, key: &CacheKey, fields: &[String]) -> Result<u64, CacheError> {
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        if hash_ref(&entries, &wire)?.is_none() {
            return Ok(0);
        }
        let hash = hash_mut(&mut entries, &wire)?;
        let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
        prune(&mut entries, &wire);
        Ok(removed as u64)
    }

    async fn hkeys(&self, key: &CacheKey) -> Result<Vec<String>, CacheError> {
        let wire = key.to_string();
        let entries = self.entries.lock().await;
        Ok(hash_ref(&entries, &wire)?
            .map(|hash| hash.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn lpush(&self, key: &CacheKey, value: String) -> Result<u64, CacheError> {
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        let list = list_mut(&mut entries, &wire)?;
        list.push_front(value);
        Ok(list.len() as u64)
    }

    async fn rpush(&self, key: &CacheKey, value: String) -> Result<u64, CacheError> {
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        let list = list_mut(&mut entries, &wire)?;
        list.push_back(value);
        Ok(list.len() as u64)
    }

    async fn lpop(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        if list_ref(&entries, &wire)?.is_none() {
            return Ok(None);
        }
        let value = list_mut(&mut entries, &wire)?.pop_front();
        prune(&mut entries, &wire);
        Ok(value)
    }

    async fn lrange(
        &self,
        key: &CacheKey,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        let wire = key.to_string();
        let entries = self.entries.lock().await;
        let Some(list) = list_ref(&entries, &wire)? else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn lset(&self, key: &CacheKey, index: isize, value: String) -> Result<(), CacheError> {
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        let out_of_range = || CacheError::OutOfRange {
            key: wire.clone(),
            index,
        };
        let Some(list) = list_ref(&entries, &wire)? else {
            return Err(out_of_range());
        };
        let len = list.len() as isize;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return Err(out_of_range());
        }
        list_mut(&mut entries, &wire)?[resolved as usize] = value;
        Ok(())
    }

    async fn ltrim(&self, key: &CacheKey, start: isize, stop: isize) -> Result<(), CacheError> {
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        let Some(list) = list_ref(&entries, &wire)? else {
            return Ok(());
        };
        let kept: VecDeque<String> = match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..to).cloned().collect(),
            None => VecDeque::new(),
        };
        entries.insert(wire.clone(), Entry::List(kept));
        prune(&mut entries, &wire);
        Ok(())
    }

    async fn lrem(&self, key: &CacheKey, count: isize, value: &str) -> Result<u64, CacheError> {
        let wire = key.to_string();
        let mut entries = self.entries.lock().await;
        if list_ref(&entries, &wire)?.is_none() {
            return Ok(0);
        }
        let list = list_mut(&mut entries, &wire)?;
        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs()
        };

        let mut removed = 0usize;
        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }
        prune(&mut entries, &wire);
        Ok(removed as u64)
    }

    async fn llen(&self, key: &CacheKey) -> Result<u64, CacheError> {
        let wire = key.to_string();
        let entries = self.entries.lock().await;
        Ok(list_ref(&entries, &wire)?.map_or(0, |list| list.len() as u64))
    }

    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<CacheKey>, CacheError> {
        let entries = self.entries.lock().await;
        let mut wires: Vec<&String> = entries.keys().filter(|k| pattern.matches(k)).collect();
        wires.sort();
        Ok(wires.into_iter().filter_map(|k| k.parse().ok()).collect())
    }

    async fn delete_pattern(&self, pattern: &KeyPattern) -> Result<u64, CacheError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|k, _| !pattern.matches(k));
        Ok((before - entries.len()) as u64)
    }
}
