use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use turntable_common::{AssetId, NodeId, Transform};

/// What a scene node contributes to the rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Pure grouping node with no visual of its own.
    Group,
    /// Mesh instance referencing a loaded asset by handle.
    Mesh { asset: AssetId },
    /// Ambient light tinting every surface uniformly.
    AmbientLight { color: Vec3 },
}

/// A node in the scene tree.
///
/// `spin` is the turntable angle in radians, applied in the node's object
/// space ahead of its fixed orientation. Keeping it out of
/// `transform.rotation` means the mounting orientation written at insertion
/// is never rewritten by animation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNode {
    pub id: NodeId,
    pub transform: Transform,
    pub spin: f32,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(transform: Transform) -> Self {
        Self {
            id: NodeId::new(),
            transform,
            spin: 0.0,
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(asset: AssetId, transform: Transform) -> Self {
        Self {
            id: NodeId::new(),
            transform,
            spin: 0.0,
            kind: NodeKind::Mesh { asset },
            children: Vec::new(),
        }
    }

    pub fn ambient(color: Vec3) -> Self {
        Self {
            id: NodeId::new(),
            transform: Transform::default(),
            spin: 0.0,
            kind: NodeKind::AmbientLight { color },
            children: Vec::new(),
        }
    }

    /// Local matrix with the spin folded in: scale, then spin about the
    /// object z axis, then the fixed orientation, then translation.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.transform.scale,
            self.transform.rotation * Quat::from_rotation_z(self.spin),
            self.transform.position,
        )
    }
}

/// The scene tree.
///
/// A hidden root group holds top-level nodes. The tree is built once at
/// startup (ambient light) and extended once when the model arrives; after
/// that only per-frame animation fields change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneGraph {
    root: SceneNode,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            root: SceneNode::group(Transform::default()),
        }
    }

    /// Insert a top-level node. Returns its id.
    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        let id = node.id;
        self.root.children.push(node);
        id
    }

    /// Find a node anywhere in the tree.
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        find(&self.root, id)
    }

    /// Find a node anywhere in the tree, mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        find_mut(&mut self.root, id)
    }

    /// Number of nodes in the tree, the hidden root excluded.
    pub fn node_count(&self) -> usize {
        count(&self.root) - 1
    }

    /// Combined ambient light color. Black when no light is present.
    pub fn ambient_color(&self) -> Vec3 {
        let mut color = Vec3::ZERO;
        self.visit(|node, _| {
            if let NodeKind::AmbientLight { color: c } = node.kind {
                color += c;
            }
        });
        color
    }

    /// Visit every node depth-first with its world matrix.
    pub fn visit<F: FnMut(&SceneNode, Mat4)>(&self, mut f: F) {
        for child in &self.root.children {
            visit_inner(child, Mat4::IDENTITY, &mut f);
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn find(node: &SceneNode, id: NodeId) -> Option<&SceneNode> {
    if node.id == id {
        return Some(node);
    }
    node.children.iter().find_map(|child| find(child, id))
}

fn find_mut(node: &mut SceneNode, id: NodeId) -> Option<&mut SceneNode> {
    if node.id == id {
        return Some(node);
    }
    node.children
        .iter_mut()
        .find_map(|child| find_mut(child, id))
}

fn count(node: &SceneNode) -> usize {
    1 + node.children.iter().map(count).sum::<usize>()
}

fn visit_inner<F: FnMut(&SceneNode, Mat4)>(node: &SceneNode, parent: Mat4, f: &mut F) {
    let world = parent * node.local_matrix();
    f(node, world);
    for child in &node.children {
        visit_inner(child, world, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_starts_empty() {
        let scene = SceneGraph::new();
        assert_eq!(scene.node_count(), 0);
        assert_eq!(scene.ambient_color(), Vec3::ZERO);
    }

    #[test]
    fn insert_and_get() {
        let mut scene = SceneGraph::new();
        let id = scene.insert(SceneNode::mesh(AssetId(1), Transform::default()));
        assert_eq!(scene.node_count(), 1);
        let node = scene.get(id).unwrap();
        assert_eq!(node.kind, NodeKind::Mesh { asset: AssetId(1) });
    }

    #[test]
    fn get_mut_updates_spin() {
        let mut scene = SceneGraph::new();
        let id = scene.insert(SceneNode::mesh(AssetId(1), Transform::default()));
        scene.get_mut(id).unwrap().spin = 1.25;
        assert_eq!(scene.get(id).unwrap().spin, 1.25);
    }

    #[test]
    fn ambient_color_sums_lights() {
        let mut scene = SceneGraph::new();
        scene.insert(SceneNode::ambient(Vec3::new(0.8, 0.8, 0.8)));
        assert_eq!(scene.ambient_color(), Vec3::new(0.8, 0.8, 0.8));
        scene.insert(SceneNode::ambient(Vec3::new(0.1, 0.0, 0.0)));
        assert_eq!(scene.ambient_color(), Vec3::new(0.9, 0.8, 0.8));
    }

    #[test]
    fn world_matrix_composes_parent_chain() {
        let mut scene = SceneGraph::new();
        let mut group = SceneNode::group(Transform {
            position: Vec3::new(2.0, 0.0, 0.0),
            ..Transform::default()
        });
        let child = SceneNode::mesh(
            AssetId(1),
            Transform {
                position: Vec3::new(0.0, 1.0, 0.0),
                ..Transform::default()
            },
        );
        let child_id = child.id;
        group.children.push(child);
        scene.insert(group);

        let mut seen = None;
        scene.visit(|node, world| {
            if node.id == child_id {
                seen = Some(world);
            }
        });
        let world = seen.unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(2.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn spin_rotates_about_object_z() {
        let mut node = SceneNode::mesh(AssetId(1), Transform::default());
        node.spin = std::f32::consts::FRAC_PI_2;
        let spun = node.local_matrix().transform_point3(Vec3::X);
        assert!((spun - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn spin_composes_before_mounting_orientation() {
        // A node tipped a quarter turn about X spins about its own z axis,
        // which the tilt has mapped onto world -Y.
        let mut node = SceneNode::mesh(
            AssetId(1),
            Transform {
                rotation: Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
                ..Transform::default()
            },
        );
        node.spin = std::f32::consts::FRAC_PI_2;
        // Object X: spun to object Y first, then tilted onto world Z.
        let moved = node.local_matrix().transform_point3(Vec3::X);
        assert!((moved - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn visit_covers_every_node() {
        let mut scene = SceneGraph::new();
        scene.insert(SceneNode::ambient(Vec3::ONE));
        scene.insert(SceneNode::mesh(AssetId(9), Transform::default()));
        let mut visited = 0;
        scene.visit(|_, _| visited += 1);
        assert_eq!(visited, scene.node_count());
    }
}
