use crate::registration::Registration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Decode,
    Encode,
}

pub fn path_of(reg: &Registration, direction: Direction) -> &[String] {
    match direction {
        Direction::Decode => &reg.decode_path,
        Direction::Encode => &reg.encode_path,
    }
}

fn active(reg: &Registration, direction: Direction) -> bool {
    match direction {
        Direction::Decode => reg.decodes(),
        Direction::Encode => reg.encodes(),
    }
}

/// One container level of the key-path trie. Children keep first-insertion
/// order so that fields sharing a prefix land in a single shared node and
/// emitted containers follow declaration order.
#[derive(Debug, Default)]
pub struct KeyPathNode {
    pub children: Vec<(String, KeyPathNode)>,
    /// Registration indices whose terminal key lives at this level.
    pub fields: Vec<usize>,
}

impl KeyPathNode {
    fn child_mut(&mut self, segment: &str) -> &mut KeyPathNode {
        let pos = match self.children.iter().position(|(s, _)| s == segment) {
            Some(pos) => pos,
            None => {
                self.children.push((segment.to_string(), KeyPathNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[pos].1
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.fields.is_empty()
    }
}

/// Builds the per-direction trie over every registration active in that
/// direction. Whole-value registrations have no keyed path and are left
/// to the synthesizers' shortcut.
pub fn build_tree(regs: &[Registration], direction: Direction) -> KeyPathNode {
    let mut root = KeyPathNode::default();
    for (index, reg) in regs.iter().enumerate() {
        if !active(reg, direction) {
            continue;
        }
        let path = path_of(reg, direction);
        let Some((_, prefix)) = path.split_last() else {
            continue;
        };
        let mut node = &mut root;
        for segment in prefix {
            node = node.child_mut(segment);
        }
        node.fields.push(index);
    }
    root
}

pub fn subtree_has_default(node: &KeyPathNode, regs: &[Registration]) -> bool {
    node.fields.iter().any(|&i| regs[i].default.is_some())
        || node.children.iter().any(|(_, child)| subtree_has_default(child, regs))
}

pub fn subtree_has_required(node: &KeyPathNode, regs: &[Registration]) -> bool {
    node.fields
        .iter()
        .any(|&i| regs[i].default.is_none() && !regs[i].is_optional)
        || node.children.iter().any(|(_, child)| subtree_has_required(child, regs))
}
