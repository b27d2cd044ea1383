use std::collections::HashMap;

use crate::models::path_depth;

/// 已发现的服务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub id: String,
    pub name: String,
    pub folder_path: String,
}

/// 一次合并的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    /// 新路径更深，替换了已有记录
    Replaced,
    /// 新路径不比已有路径深，保留先到的记录
    Kept,
}

impl MergeOutcome {
    pub fn is_stored(self) -> bool {
        !matches!(self, MergeOutcome::Kept)
    }
}

/// 按服务ID去重的盘点表
///
/// 同一服务可能在依赖图的多个文件夹下出现，路径段数最多的位置视为权威位置；
/// 段数相同时保留先发现的记录。遍历顺序为每个ID首次发现的顺序。
#[derive(Debug, Clone, Default)]
pub struct InventoryMap {
    entries: Vec<InventoryEntry>,
    index: HashMap<String, usize>,
}

impl InventoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, id: &str, name: &str, folder_path: &str) -> MergeOutcome {
        match self.index.get(id).copied() {
            None => {
                self.index.insert(id.to_string(), self.entries.len());
                self.entries.push(InventoryEntry {
                    id: id.to_string(),
                    name: name.to_string(),
                    folder_path: folder_path.to_string(),
                });
                MergeOutcome::Inserted
            }
            Some(slot) => {
                let existing = &mut self.entries[slot];
                if path_depth(folder_path) > path_depth(&existing.folder_path) {
                    existing.name = name.to_string();
                    existing.folder_path = folder_path.to_string();
                    MergeOutcome::Replaced
                } else {
                    MergeOutcome::Kept
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&InventoryEntry> {
        self.index.get(id).map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InventoryEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<InventoryEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deeper_path_wins_in_either_order() {
        let mut map = InventoryMap::new();
        assert_eq!(map.merge("S", "Svc", "/A/B"), MergeOutcome::Inserted);
        assert_eq!(map.merge("S", "Svc", "/A/B/C/D"), MergeOutcome::Replaced);
        assert_eq!(map.get("S").unwrap().folder_path, "/A/B/C/D");

        let mut map = InventoryMap::new();
        map.merge("S", "Svc", "/A/B/C/D");
        assert_eq!(map.merge("S", "Svc", "/A/B"), MergeOutcome::Kept);
        assert_eq!(map.get("S").unwrap().folder_path, "/A/B/C/D");
    }

    #[test]
    fn test_equal_depth_keeps_first_observed() {
        let mut map = InventoryMap::new();
        map.merge("S", "Svc", "/A/B");
        assert_eq!(map.merge("S", "Svc", "/A/C"), MergeOutcome::Kept);
        assert_eq!(map.get("S").unwrap().folder_path, "/A/B");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_replacement_keeps_discovery_order() {
        let mut map = InventoryMap::new();
        map.merge("s1", "One", "/A");
        map.merge("s2", "Two", "/A");
        map.merge("s1", "One", "/A/B");

        let ids: Vec<_> = map.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(map.into_entries()[0].folder_path, "/A/B");
    }
}
