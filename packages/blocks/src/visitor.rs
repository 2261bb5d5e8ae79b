use crate::block::{Block, BlockNode};

/// Visitor pattern for traversing block trees immutably
///
/// The default implementations walk the entire tree depth-first, parents
/// before children. Override `visit_block` to act on every block, or
/// `visit_node` to control descent.
pub trait Visitor: Sized {
    fn visit_node(&mut self, node: &BlockNode) {
        walk_node(self, node);
    }

    fn visit_block(&mut self, _block: &Block) {}

    fn visit_nodes(&mut self, nodes: &[BlockNode]) {
        for node in nodes {
            self.visit_node(node);
        }
    }
}

/// Mutable visitor pattern for rewriting block trees in place
pub trait VisitorMut: Sized {
    fn visit_node_mut(&mut self, node: &mut BlockNode) {
        walk_node_mut(self, node);
    }

    fn visit_block_mut(&mut self, _block: &mut Block) {}

    fn visit_nodes_mut(&mut self, nodes: &mut [BlockNode]) {
        for node in nodes {
            self.visit_node_mut(node);
        }
    }
}

pub fn walk_node<V: Visitor>(visitor: &mut V, node: &BlockNode) {
    visitor.visit_block(&node.block);
    for child in &node.inner_blocks {
        visitor.visit_node(child);
    }
}

pub fn walk_node_mut<V: VisitorMut>(visitor: &mut V, node: &mut BlockNode) {
    visitor.visit_block_mut(&mut node.block);
    for child in &mut node.inner_blocks {
        visitor.visit_node_mut(child);
    }
}
