//! Folder forest navigation.
//!
//! Folders arrive as a flat list where each entry names its parent by id.
//! [`FolderForest`] indexes that list once and answers tree questions by
//! lookup. Parent ids that point nowhere make a folder a root. Cycles in
//! malformed input terminate instead of looping.

use crate::models::{MusicFolder, Track};
use std::collections::{HashMap, HashSet};

pub struct FolderForest<'a> {
    folders: &'a [MusicFolder],
    by_id: HashMap<&'a str, usize>,
    children: HashMap<&'a str, Vec<usize>>,
}

impl<'a> FolderForest<'a> {
    pub fn new(folders: &'a [MusicFolder]) -> Self {
        let by_id: HashMap<&str, usize> = folders
            .iter()
            .enumerate()
            .map(|(index, folder)| (folder.id.as_str(), index))
            .collect();

        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, folder) in folders.iter().enumerate() {
            if let Some(parent) = folder.parent_id.as_deref() {
                if by_id.contains_key(parent) {
                    children.entry(parent).or_default().push(index);
                }
            }
        }

        Self {
            folders,
            by_id,
            children,
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a MusicFolder> {
        self.by_id.get(id).map(|&index| &self.folders[index])
    }

    /// Folders without a resolvable parent, in input order.
    pub fn roots(&self) -> Vec<&'a MusicFolder> {
        self.folders
            .iter()
            .filter(|folder| match folder.parent_id.as_deref() {
                None => true,
                Some(parent) => !self.by_id.contains_key(parent),
            })
            .collect()
    }

    /// Direct children of `id`, in input order.
    pub fn children(&self, id: &str) -> Vec<&'a MusicFolder> {
        self.children
            .get(id)
            .map(|indices| indices.iter().map(|&i| &self.folders[i]).collect())
            .unwrap_or_default()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<&'a MusicFolder> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(id);

        let mut cursor = self.get(id).and_then(|f| f.parent_id.as_deref());
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                break;
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            chain.push(parent);
            cursor = parent.parent_id.as_deref();
        }
        chain
    }

    /// `id` and every folder below it.
    pub fn descendant_ids(&self, id: &str) -> HashSet<&'a str> {
        let mut out: HashSet<&'a str> = HashSet::new();
        let Some(root) = self.get(id) else {
            return out;
        };

        let mut stack = vec![root.id.as_str()];
        while let Some(current) = stack.pop() {
            if !out.insert(current) {
                continue;
            }
            for child in self.children(current) {
                stack.push(child.id.as_str());
            }
        }
        out
    }

    /// Tracks that live in `id` or any folder below it, in input order.
    pub fn tracks_under<'t>(&self, id: &str, tracks: &'t [Track]) -> Vec<&'t Track> {
        let ids = self.descendant_ids(id);
        tracks
            .iter()
            .filter(|track| {
                track
                    .folder_id
                    .as_deref()
                    .is_some_and(|folder| ids.contains(folder))
            })
            .collect()
    }
}
