//! Image discovery and front/list pairing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KartkaError, Result};

/// Extensions treated as scans, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Whether `path` has an image extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Image files directly inside `dir`, sorted by name.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| KartkaError::io(dir, e))?;
    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| KartkaError::io(dir, e))?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| name_of(a).cmp(&name_of(b)));
    Ok(images)
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A front page matched with a list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub front: PathBuf,
    pub list: PathBuf,
    /// The list page precedes the front page: no following one was left.
    #[serde(default)]
    pub fallback: bool,
}

impl Pair {
    pub fn new(front: impl Into<PathBuf>, list: impl Into<PathBuf>) -> Self {
        Self {
            front: front.into(),
            list: list.into(),
            fallback: false,
        }
    }

    /// `<front_stem>__<list_stem>`, the pair's output directory name.
    pub fn dir_name(&self) -> String {
        let stem = |p: &Path| {
            p.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        format!("{}__{}", stem(&self.front), stem(&self.list))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    /// Sorted files taken two at a time: front, then list.
    #[default]
    Sorted,
    /// Pages classified first, then matched by nearest following name.
    Classified,
}

/// Pair sorted files as `(0, 1), (2, 3), ...`; a trailing file is dropped.
pub fn pair_sorted(files: &[PathBuf]) -> Vec<Pair> {
    let mut sorted = files.to_vec();
    sorted.sort_by(|a, b| name_of(a).cmp(&name_of(b)));
    if sorted.len() % 2 == 1 {
        if let Some(dropped) = sorted.last() {
            debug!(file = %dropped.display(), "odd file count, last file unpaired");
        }
    }
    sorted
        .chunks_exact(2)
        .map(|chunk| Pair::new(chunk[0].clone(), chunk[1].clone()))
        .collect()
}

/// Greedy nearest-following match of front pages to list pages.
///
/// Each front page (in name order) takes the smallest unused list page whose
/// name is not before its own; failing that, the smallest unused list page
/// at all, marked as a fallback. Front pages left over are dropped.
pub fn pair_nearest_following(fronts: &[PathBuf], lists: &[PathBuf]) -> Vec<Pair> {
    let mut fronts = fronts.to_vec();
    fronts.sort_by(|a, b| name_of(a).cmp(&name_of(b)));
    let mut lists: Vec<(String, &PathBuf)> = lists.iter().map(|p| (name_of(p), p)).collect();
    lists.sort_by(|a, b| a.0.cmp(&b.0));
    let mut used = vec![false; lists.len()];

    let mut pairs = Vec::new();
    for front in fronts {
        let front_name = name_of(&front);
        let following = (0..lists.len()).find(|&i| !used[i] && lists[i].0 >= front_name);
        let (chosen, fallback) = match following {
            Some(i) => (Some(i), false),
            None => ((0..lists.len()).find(|&i| !used[i]), true),
        };
        match chosen {
            Some(i) => {
                used[i] = true;
                if fallback {
                    debug!(front = %front_name, list = %lists[i].0, "fallback pairing");
                }
                pairs.push(Pair {
                    front,
                    list: lists[i].1.clone(),
                    fallback,
                });
            }
            None => debug!(front = %front_name, "no list page left"),
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_sorted_pairs_drop_trailing() {
        let pairs = pair_sorted(&paths(&["003.jpg", "001.jpg", "002.jpg"]));
        assert_eq!(pairs, vec![Pair::new("001.jpg", "002.jpg")]);
    }

    #[test]
    fn test_nearest_following() {
        let pairs = pair_nearest_following(&paths(&["c", "a"]), &paths(&["d", "b"]));
        assert_eq!(pairs, vec![Pair::new("a", "b"), Pair::new("c", "d")]);
    }

    #[test]
    fn test_nearest_following_fallback() {
        let pairs = pair_nearest_following(&paths(&["b"]), &paths(&["a"]));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].list, PathBuf::from("a"));
        assert!(pairs[0].fallback);
    }

    #[test]
    fn test_unmatched_fronts_dropped() {
        let pairs = pair_nearest_following(&paths(&["a", "c", "e"]), &paths(&["b"]));
        assert_eq!(pairs, vec![Pair::new("a", "b")]);
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("scan.JPG")));
        assert!(is_image(Path::new("scan.jpeg")));
        assert!(is_image(Path::new("scan.Png")));
        assert!(!is_image(Path::new("scan.tif")));
        assert!(!is_image(Path::new("classification.json")));
    }

    #[test]
    fn test_discover_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "notes.txt"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        let found: Vec<String> = discover_images(tmp.path())
            .unwrap()
            .iter()
            .map(|p| name_of(p))
            .collect();
        assert_eq!(found, vec!["a.PNG", "b.jpg"]);
    }

    #[test]
    fn test_dir_name() {
        assert_eq!(Pair::new("/x/0001.jpg", "/x/0002.jpg").dir_name(), "0001__0002");
    }
}
