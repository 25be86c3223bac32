use std::collections::HashMap;
use std::net::SocketAddr;

use ledmesh_proto::NodeId;

/// Live bindings between connection addresses and node ids.
///
/// Both directions are kept in step; the table is never persisted.
#[derive(Debug, Default)]
pub struct Sessions {
    by_addr: HashMap<SocketAddr, NodeId>,
    by_node: HashMap<NodeId, SocketAddr>,
}

impl Sessions {
    pub fn node_of(&self, addr: &SocketAddr) -> Option<&NodeId> {
        self.by_addr.get(addr)
    }

    pub fn addr_of(&self, node: &NodeId) -> Option<SocketAddr> {
        self.by_node.get(node).copied()
    }

    /// Bind `addr` to `node`. Returns the node's previous address if it was
    /// bound elsewhere; that binding is dropped.
    pub fn bind(&mut self, addr: SocketAddr, node: NodeId) -> Option<SocketAddr> {
        let previous = self.by_node.insert(node.clone(), addr);
        if let Some(old) = previous {
            self.by_addr.remove(&old);
        }
        self.by_addr.insert(addr, node);
        previous.filter(|old| *old != addr)
    }

    pub fn unbind(&mut self, addr: &SocketAddr) -> Option<NodeId> {
        let node = self.by_addr.remove(addr)?;
        if self.by_node.get(&node) == Some(addr) {
            self.by_node.remove(&node);
        }
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    #[test]
    fn bind_and_unbind() {
        let mut sessions = Sessions::default();
        assert_eq!(sessions.bind(addr(1), NodeId::new("a")), None);
        assert_eq!(sessions.node_of(&addr(1)), Some(&NodeId::new("a")));
        assert_eq!(sessions.addr_of(&NodeId::new("a")), Some(addr(1)));

        assert_eq!(sessions.unbind(&addr(1)), Some(NodeId::new("a")));
        assert!(sessions.is_empty());
        assert_eq!(sessions.unbind(&addr(1)), None);
    }

    #[test]
    fn rebinding_a_node_drops_the_old_address() {
        let mut sessions = Sessions::default();
        sessions.bind(addr(1), NodeId::new("a"));
        assert_eq!(sessions.bind(addr(2), NodeId::new("a")), Some(addr(1)));
        assert_eq!(sessions.len(), 1);
        assert!(sessions.node_of(&addr(1)).is_none());
        assert_eq!(sessions.addr_of(&NodeId::new("a")), Some(addr(2)));
    }
}
