use std::collections::HashMap;
use std::hash::Hash;

use ledmesh_proto::{InputId, NodeId, OutputId, State};

/// Which node owns each input and output.
///
/// Ownership outlives connectivity: a disconnected node still owns the
/// resources it announced, so profiles can be resolved while it is away.
#[derive(Debug, Default, Clone)]
pub struct OwnerIndex {
    inputs: HashMap<InputId, NodeId>,
    outputs: HashMap<OutputId, NodeId>,
}

impl OwnerIndex {
    /// Build the index from persisted state.
    ///
    /// A record tagged `moved_to` loses to any node that lists the same id
    /// without the tag. Among untagged duplicates the later node in id order
    /// wins.
    pub fn from_state(state: &State) -> Self {
        let mut index = Self::default();
        for node in state.nodes.values() {
            for input in node.inputs.values() {
                claim(&mut index.inputs, &input.id, &node.id, input.moved_to.is_some());
            }
            for output in node.outputs.values() {
                claim(&mut index.outputs, &output.id, &node.id, output.moved_to.is_some());
            }
        }
        index
    }

    pub fn input_owner(&self, id: &InputId) -> Option<&NodeId> {
        self.inputs.get(id)
    }

    pub fn output_owner(&self, id: &OutputId) -> Option<&NodeId> {
        self.outputs.get(id)
    }

    /// Record `node` as the owner of `id`, returning the previous owner if it
    /// was a different node.
    pub fn claim_input(&mut self, id: InputId, node: &NodeId) -> Option<NodeId> {
        self.inputs
            .insert(id, node.clone())
            .filter(|previous| previous != node)
    }

    pub fn claim_output(&mut self, id: OutputId, node: &NodeId) -> Option<NodeId> {
        self.outputs
            .insert(id, node.clone())
            .filter(|previous| previous != node)
    }
}

fn claim<K>(owners: &mut HashMap<K, NodeId>, id: &K, node: &NodeId, moved: bool)
where
    K: Clone + Eq + Hash,
{
    if moved {
        owners.entry(id.clone()).or_insert_with(|| node.clone());
    } else {
        owners.insert(id.clone(), node.clone());
    }
}
