use glam::{Affine3A, Vec2, Vec3};
use uuid::Uuid;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Builds the tightest box around `points`, or `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;

        for p in points {
            min = min.min(p);
            max = max.max(p);
            any = true;
        }

        any.then_some(Self { min, max })
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Transforms all eight corners and re-fits an axis-aligned box.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut new_min = Vec3::splat(f32::INFINITY);
        let mut new_max = Vec3::splat(f32::NEG_INFINITY);

        for point in corners {
            let transformed = matrix.transform_point3(point);
            new_min = new_min.min(transformed);
            new_max = new_max.max(transformed);
        }

        Self {
            min: new_min,
            max: new_max,
        }
    }

    /// Grows the box by `amount` on every side.
    #[must_use]
    pub fn expand(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(amount),
            max: self.max + Vec3::splat(amount),
        }
    }
}

/// CPU-side triangle geometry with optional skinning attributes.
///
/// `joints[i]` and `weights[i]` hold up to four bone influences for vertex `i`.
/// Joint values are *positions* in the bound skeleton's bone list, not names,
/// which is why rebinding has to preserve bone order.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub uuid: Uuid,

    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<Vec2>>,
    pub joints: Option<Vec<[u16; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
    pub indices: Option<Vec<u32>>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            positions: Vec::new(),
            normals: None,
            uvs: None,
            joints: None,
            weights: None,
            indices: None,
        }
    }

    #[must_use]
    pub fn with_positions(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            ..Self::new()
        }
    }

    /// Attaches per-vertex skin influences.
    #[must_use]
    pub fn with_skin(mut self, joints: Vec<[u16; 4]>, weights: Vec<[f32; 4]>) -> Self {
        self.joints = Some(joints);
        self.weights = Some(weights);
        self
    }

    /// Deep copy with a fresh identity.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.joints.is_some() && self.weights.is_some()
    }

    /// Iterates `(joint, weight)` pairs that actually influence a vertex.
    fn influences(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        let joints = self.joints.as_deref().unwrap_or_default();
        let weights = self.weights.as_deref().unwrap_or_default();

        joints
            .iter()
            .zip(weights)
            .enumerate()
            .flat_map(|(vertex, (j, w))| {
                j.iter()
                    .zip(w)
                    .filter(|(_, weight)| **weight > 0.0)
                    .map(move |(joint, _)| (vertex, *joint))
            })
    }

    /// Highest joint index carrying non-zero weight.
    #[must_use]
    pub fn max_joint_index(&self) -> Option<u16> {
        self.influences().map(|(_, joint)| joint).max()
    }

    /// Number of vertices with at least one weighted joint at or past `bone_count`.
    #[must_use]
    pub fn vertices_outside(&self, bone_count: usize) -> usize {
        let mut last = None;
        let mut count = 0;
        for (vertex, joint) in self.influences() {
            if usize::from(joint) >= bone_count && last != Some(vertex) {
                count += 1;
                last = Some(vertex);
            }
        }
        count
    }

    /// Bounds of the untransformed vertex positions.
    #[must_use]
    pub fn compute_bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.positions.iter().copied())
    }
}
