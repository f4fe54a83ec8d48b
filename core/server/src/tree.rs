//! Category forest assembly, breadcrumb paths and child-first deletion order.
//!
//! Everything here works on rows that were already loaded, so it stays free of
//! SQL. The forest is materialized from an id-keyed arena plus explicit child
//! lists; nodes own their children and never point back at their parent.

use relation_memory_schemas::{Category, CategoryId, CategoryNode, NodeKind, PersonId, TreeNode};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::warn;

pub const PATH_SEPARATOR: &str = " > ";

/// Assemble a category forest from rows in fetch order.
///
/// Roots keep fetch order, and so does every `children` list. A row whose
/// parent is not among `rows` is dropped from the output entirely.
pub fn build_category_forest(rows: Vec<(Category, i64)>) -> Vec<CategoryNode> {
    let entries = rows
        .into_iter()
        .map(|(category, person_count)| {
            let node = CategoryNode {
                id: category.id,
                name: category.title,
                parent_id: category.parent_id,
                is_root: category.is_root,
                color: category.color,
                person_count,
                children: Vec::new(),
            };
            (category.id, category.parent_id, node)
        })
        .collect();

    assemble(entries, |node: &mut CategoryNode, children| node.children = children)
}

/// Assemble the mixed category/person tree. Among siblings, categories come
/// before persons; each group keeps the order it was given in.
pub fn build_node_tree(
    categories: Vec<Category>,
    persons: Vec<(PersonId, String, CategoryId)>,
) -> Vec<TreeNode> {
    let mut entries = Vec::with_capacity(categories.len() + persons.len());

    for category in categories {
        let key = (NodeKind::Category, category.id.0);
        let parent = category.parent_id.map(|p| (NodeKind::Category, p.0));
        entries.push((
            key,
            parent,
            TreeNode {
                id: category.id.0,
                name: category.title,
                parent_id: category.parent_id.map(|p| p.0),
                is_root: category.is_root,
                color: category.color,
                kind: NodeKind::Category,
                children: Vec::new(),
            },
        ));
    }

    for (person_id, name, category_id) in persons {
        entries.push((
            (NodeKind::Person, person_id.0),
            Some((NodeKind::Category, category_id.0)),
            TreeNode {
                id: person_id.0,
                name,
                parent_id: Some(category_id.0),
                is_root: false,
                color: None,
                kind: NodeKind::Person,
                children: Vec::new(),
            },
        ));
    }

    assemble(entries, |node: &mut TreeNode, children| node.children = children)
}

fn assemble<K, N>(entries: Vec<(K, Option<K>, N)>, attach: fn(&mut N, Vec<N>)) -> Vec<N>
where
    K: Copy + Eq + Hash + Debug,
{
    let mut nodes: HashMap<K, N> = HashMap::with_capacity(entries.len());
    let mut links: Vec<(K, Option<K>)> = Vec::with_capacity(entries.len());

    for (key, parent, node) in entries {
        links.push((key, parent));
        nodes.insert(key, node);
    }

    let mut roots = Vec::new();
    let mut children: HashMap<K, Vec<K>> = HashMap::new();

    for (key, parent) in links {
        match parent {
            None => roots.push(key),
            Some(parent) if nodes.contains_key(&parent) => {
                children.entry(parent).or_default().push(key)
            }
            Some(parent) => {
                warn!(
                    "Dropping node {:?}: parent {:?} is not in the result set",
                    key, parent
                );
            }
        }
    }

    let forest: Vec<N> = roots
        .into_iter()
        .filter_map(|key| materialize(key, &mut nodes, &children, attach))
        .collect();

    if !nodes.is_empty() {
        warn!(
            "{} node(s) unreachable from any root, likely a parent cycle",
            nodes.len()
        );
    }

    forest
}

/// Iterative post-order build of the subtree under `root`.
fn materialize<K, N>(
    root: K,
    nodes: &mut HashMap<K, N>,
    children: &HashMap<K, Vec<K>>,
    attach: fn(&mut N, Vec<N>),
) -> Option<N>
where
    K: Copy + Eq + Hash + Debug,
{
    let mut open: HashMap<K, N> = HashMap::new();
    let mut built: HashMap<K, N> = HashMap::new();
    let mut stack = vec![(root, false)];

    while let Some((key, expanded)) = stack.pop() {
        if expanded {
            let Some(mut node) = open.remove(&key) else {
                continue;
            };
            let kids = children
                .get(&key)
                .map(|keys| keys.iter().filter_map(|child| built.remove(child)).collect())
                .unwrap_or_default();
            attach(&mut node, kids);
            built.insert(key, node);
            continue;
        }

        // Taking the node out of the arena first means a revisited key yields nothing.
        let Some(node) = nodes.remove(&key) else {
            continue;
        };
        open.insert(key, node);
        stack.push((key, true));
        if let Some(kids) = children.get(&key) {
            stack.extend(kids.iter().rev().map(|kid| (*kid, false)));
        }
    }

    built.remove(&root)
}

/// Root-to-leaf breadcrumb for a person, e.g. `나 > 가족 > 아버지`.
///
/// Walks `parent_id` upwards from `start`. If not even `start` resolves, the
/// path falls back to `fallback_title` (the person's own category title).
pub fn breadcrumb(
    categories: &HashMap<CategoryId, Category>,
    start: CategoryId,
    fallback_title: &str,
    person_name: &str,
) -> String {
    let mut titles: Vec<&str> = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = Some(start);

    while let Some(id) = cursor {
        if !visited.insert(id) {
            warn!("Category chain from {} loops back at {}", start, id);
            break;
        }

        let Some(category) = categories.get(&id) else {
            break;
        };
        titles.push(category.title.as_str());
        cursor = category.parent_id;
    }

    if titles.is_empty() {
        titles.push(fallback_title);
    }

    titles.reverse();
    titles.push(person_name);
    titles.join(PATH_SEPARATOR)
}

/// Child-before-parent deletion sequence for a set of categories.
///
/// Post-order DFS from every root. A category whose parent lies outside the
/// set counts as a root here, so every input id appears exactly once; ids
/// caught in a parent cycle come last, in input order.
pub fn deletion_order(categories: &[Category]) -> Vec<CategoryId> {
    let ids: HashSet<CategoryId> = categories.iter().map(|c| c.id).collect();
    let mut children: HashMap<CategoryId, Vec<CategoryId>> = HashMap::new();
    let mut roots = Vec::new();

    for category in categories {
        match category.parent_id {
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(category.id)
            }
            _ => roots.push(category.id),
        }
    }

    let mut order = Vec::with_capacity(categories.len());
    let mut visited = HashSet::with_capacity(categories.len());

    for root in roots {
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            if let Some(kids) = children.get(&id) {
                stack.extend(kids.iter().rev().map(|kid| (*kid, false)));
            }
        }
    }

    for category in categories {
        if visited.insert(category.id) {
            warn!("Category {} is part of a parent cycle", category.id);
            order.push(category.id);
        }
    }

    order
}
