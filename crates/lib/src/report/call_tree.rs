//! Reader for the call-tree report written by `-H:+PrintAnalysisCallTree`.
//!
//! The report is an indented tree; the column at which the edge keyword starts
//! gives the depth of a node:
//!
//! ```text
//! VM Entry Points
//! ├── entry com.example.Main.main(String[]):void id=1
//! │   ├── directly calls com.example.Service.run():void id=2 @bci=4
//! │   │   └── virtually calls com.example.Store.load():void id=3 @bci=9
//! │   │       └── is overridden by com.example.DiskStore.load():void id=4
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix of the report file names the compiler writes into the reports directory.
pub const CALL_TREE_PREFIX: &str = "call_tree";

const KEYWORDS: [&str; 5] = [
  "entry ",
  "directly calls ",
  "virtually calls ",
  "interfacically calls ",
  "is overridden by ",
];

#[derive(Debug, Clone)]
struct Node {
  /// Method signature as printed, without the trailing `id=` and `@bci=` tags.
  method: String,
  /// Qualified method name (everything before the parameter list).
  key: String,
  parent: Option<usize>,
}

/// Parsed call tree.
#[derive(Debug, Clone, Default)]
pub struct CallTree {
  nodes: Vec<Node>,
}

impl CallTree {
  /// Locate a call-tree report in `reports_dir`.
  ///
  /// Returns `None` when the directory is missing or holds no report.
  pub fn find(reports_dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(reports_dir)
      .ok()?
      .filter_map(Result::ok)
      .filter(|entry| entry.file_name().to_string_lossy().starts_with(CALL_TREE_PREFIX))
      .map(|entry| entry.path())
      .filter(|path| path.is_file())
      .collect();
    candidates.sort();
    candidates.into_iter().next()
  }

  pub fn load(path: &Path) -> io::Result<Self> {
    Ok(Self::parse(&fs::read_to_string(path)?))
  }

  pub fn parse(text: &str) -> Self {
    let mut nodes: Vec<Node> = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for line in text.lines() {
      let Some((column, rest)) = find_edge(line) else {
        continue;
      };

      while stack.last().is_some_and(|&(col, _)| col >= column) {
        stack.pop();
      }

      let method = strip_tags(rest).to_string();
      let key = method_key(&method).to_string();
      nodes.push(Node {
        method,
        key,
        parent: stack.last().map(|&(_, idx)| idx),
      });
      stack.push((column, nodes.len() - 1));
    }

    Self { nodes }
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Shortest chain of methods from an entry point to `target`, entry first.
  ///
  /// `target` may be a bare qualified name or a full signature.
  pub fn analyse(&self, target: &str) -> Option<Vec<String>> {
    let key = method_key(target);

    self
      .nodes
      .iter()
      .enumerate()
      .filter(|(_, node)| node.key == key)
      .map(|(idx, _)| self.chain_to(idx))
      .min_by_key(Vec::len)
  }

  fn chain_to(&self, idx: usize) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = Some(idx);
    while let Some(i) = current {
      chain.push(self.nodes[i].method.clone());
      current = self.nodes[i].parent;
    }
    chain.reverse();
    chain
  }
}

/// Column (in characters) of the edge keyword and the text following it.
fn find_edge(line: &str) -> Option<(usize, &str)> {
  KEYWORDS
    .iter()
    .filter_map(|kw| line.find(kw).map(|pos| (pos, &line[pos + kw.len()..])))
    .min_by_key(|(pos, _)| *pos)
    .map(|(pos, rest)| (line[..pos].chars().count(), rest.trim()))
}

fn strip_tags(text: &str) -> &str {
  let end = [" id=", " @bci="]
    .iter()
    .filter_map(|tag| text.find(tag))
    .min()
    .unwrap_or(text.len());
  text[..end].trim()
}

fn method_key(signature: &str) -> &str {
  signature.split('(').next().unwrap_or(signature).trim()
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const TREE: &str = "\
VM Entry Points
├── entry com.example.Main.main(String[]):void id=1
│   ├── directly calls com.example.Service.run():void id=2 @bci=4
│   │   └── virtually calls com.example.Store.load():void id=3 @bci=9
│   │       └── is overridden by com.example.DiskStore.load():void id=4
│   └── directly calls com.example.DiskStore.load():void id=5 @bci=12
└── entry com.example.Worker.start():void id=6
    └── interfacically calls com.example.Store.load():void id=7 @bci=1
        └── is overridden by com.example.RemoteStore.load():void id=8
";

  #[test]
  fn parses_parents_from_columns() {
    let tree = CallTree::parse(TREE);

    let chain = tree.analyse("com.example.RemoteStore.load").unwrap();
    assert_eq!(
      chain,
      vec![
        "com.example.Worker.start():void",
        "com.example.Store.load():void",
        "com.example.RemoteStore.load():void",
      ]
    );
  }

  #[test]
  fn picks_the_shortest_chain() {
    let tree = CallTree::parse(TREE);

    let chain = tree.analyse("com.example.DiskStore.load(java.lang.String)").unwrap();
    assert_eq!(
      chain,
      vec!["com.example.Main.main(String[]):void", "com.example.DiskStore.load():void"]
    );
  }

  #[test]
  fn unknown_method_has_no_chain() {
    let tree = CallTree::parse(TREE);
    assert!(tree.analyse("com.example.Nope.run").is_none());
    assert!(CallTree::parse("garbage\n").is_empty());
  }

  #[test]
  fn finds_report_by_prefix() {
    let dir = TempDir::new().unwrap();
    assert!(CallTree::find(dir.path()).is_none());

    std::fs::write(dir.path().join("build_stats.txt"), "").unwrap();
    std::fs::write(dir.path().join("call_tree_app_20240101.txt"), TREE).unwrap();

    let found = CallTree::find(dir.path()).unwrap();
    assert!(found.ends_with("call_tree_app_20240101.txt"));
    assert!(!CallTree::load(&found).unwrap().is_empty());
  }

  #[test]
  fn missing_directory_is_not_an_error() {
    assert!(CallTree::find(Path::new("/definitely/not/here")).is_none());
  }
}
