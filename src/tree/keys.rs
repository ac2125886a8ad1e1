//! Keyboard navigation over a [`Tree`].
use super::{NodeId, Tree};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeKey {
    Home,
    End,
    Left,
    Right,
    Up,
    Down,
}

impl TreeKey {
    /// Map a DOM `keyCode` (35..=40) to a navigation key.
    pub fn from_key_code(code: u32) -> Option<TreeKey> {
        match code {
            35 => Some(TreeKey::End),
            36 => Some(TreeKey::Home),
            37 => Some(TreeKey::Left),
            38 => Some(TreeKey::Up),
            39 => Some(TreeKey::Right),
            40 => Some(TreeKey::Down),
            _ => None,
        }
    }

    /// Left and Right trade places in right-to-left locales.
    pub fn mirrored(self, right_to_left: bool) -> TreeKey {
        match (self, right_to_left) {
            (TreeKey::Left, true) => TreeKey::Right,
            (TreeKey::Right, true) => TreeKey::Left,
            (key, _) => key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Expand or collapse the node; focus stays on it.
    Toggle(NodeId),
    Focus(NodeId),
    Stay,
}

/// Decide what `key` does to the `focused` node. Keys are expected to be
/// already mirrored for the locale.
pub fn key_action<N>(tree: &Tree<N>, focused: NodeId, key: TreeKey) -> KeyAction {
    let Some(node) = tree.node(focused) else {
        return KeyAction::Stay;
    };
    let focus = |id: Option<NodeId>| id.map(KeyAction::Focus).unwrap_or(KeyAction::Stay);
    match key {
        TreeKey::Left if node.expanded => KeyAction::Toggle(focused),
        TreeKey::Left => focus(node.parent),
        TreeKey::Right if node.is_leaf => KeyAction::Stay,
        TreeKey::Right if !node.expanded => KeyAction::Toggle(focused),
        TreeKey::Right => focus(tree.children(focused).first().copied()),
        TreeKey::Down if node.expanded => focus(tree.children(focused).first().copied()),
        TreeKey::Down => {
            let mut level = Some(focused);
            while let Some(current) = level {
                if let Some(next) = tree.next_sibling(current) {
                    return KeyAction::Focus(next);
                }
                level = tree.parent(current);
            }
            KeyAction::Stay
        }
        TreeKey::Up => match tree.previous_sibling(focused) {
            Some(prev) => KeyAction::Focus(tree.deepest_visible(prev)),
            None => focus(node.parent),
        },
        TreeKey::Home => focus(tree.roots().first().copied()),
        TreeKey::End => focus(tree.roots().last().map(|last| tree.deepest_visible(*last))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeItem;

    // a (b (c, d), e)   f
    fn fixture() -> (Tree<&'static str>, Vec<NodeId>) {
        let mut tree = Tree::new();
        let roots = tree.attach(
            None,
            vec![TreeItem::branch("a", vec![]), TreeItem::leaf("f")],
        );
        let a = tree.attach(
            Some(roots[0]),
            vec![TreeItem::branch("b", vec![]), TreeItem::leaf("e")],
        );
        let b = tree.attach(Some(a[0]), vec![TreeItem::leaf("c"), TreeItem::leaf("d")]);
        (tree, vec![roots[0], a[0], b[0], b[1], a[1], roots[1]])
    }

    #[test]
    fn left_right_toggle_then_move() {
        let (mut tree, ids) = fixture();
        let [a, b, ..] = ids[..] else { unreachable!() };
        assert_eq!(key_action(&tree, a, TreeKey::Right), KeyAction::Toggle(a));
        tree.set_expanded(a, true);
        assert_eq!(key_action(&tree, a, TreeKey::Right), KeyAction::Focus(b));
        assert_eq!(key_action(&tree, a, TreeKey::Left), KeyAction::Toggle(a));
        assert_eq!(key_action(&tree, b, TreeKey::Left), KeyAction::Focus(a));
        assert_eq!(key_action(&tree, a, TreeKey::Left.mirrored(true)), KeyAction::Focus(b));
    }

    #[test]
    fn down_climbs_to_next_ancestor_sibling() {
        let (mut tree, ids) = fixture();
        let [a, b, _c, d, e, f] = ids[..] else { unreachable!() };
        tree.set_expanded(a, true);
        tree.set_expanded(b, true);
        assert_eq!(key_action(&tree, a, TreeKey::Down), KeyAction::Focus(b));
        assert_eq!(key_action(&tree, d, TreeKey::Down), KeyAction::Focus(e));
        assert_eq!(key_action(&tree, e, TreeKey::Down), KeyAction::Focus(f));
        assert_eq!(key_action(&tree, f, TreeKey::Down), KeyAction::Stay);
    }

    #[test]
    fn up_enters_deepest_visible_of_previous_sibling() {
        let (mut tree, ids) = fixture();
        let [a, b, c, d, e, f] = ids[..] else { unreachable!() };
        tree.set_expanded(a, true);
        assert_eq!(key_action(&tree, e, TreeKey::Up), KeyAction::Focus(b));
        tree.set_expanded(b, true);
        assert_eq!(key_action(&tree, e, TreeKey::Up), KeyAction::Focus(d));
        assert_eq!(key_action(&tree, f, TreeKey::Up), KeyAction::Focus(e));
        assert_eq!(key_action(&tree, c, TreeKey::Up), KeyAction::Focus(b));
        assert_eq!(key_action(&tree, a, TreeKey::Up), KeyAction::Stay);
    }

    #[test]
    fn home_and_end() {
        let (mut tree, ids) = fixture();
        let [a, _, _, _, _, f] = ids[..] else { unreachable!() };
        assert_eq!(key_action(&tree, f, TreeKey::Home), KeyAction::Focus(a));
        assert_eq!(key_action(&tree, a, TreeKey::End), KeyAction::Focus(f));
        tree.set_expanded(a, true);
        assert_eq!(key_action(&tree, a, TreeKey::End), KeyAction::Focus(f));
    }

    #[test]
    fn key_codes() {
        assert_eq!(TreeKey::from_key_code(36), Some(TreeKey::Home));
        assert_eq!(TreeKey::from_key_code(40), Some(TreeKey::Down));
        assert_eq!(TreeKey::from_key_code(13), None);
    }
}
