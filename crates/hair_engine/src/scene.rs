//! Scene meshes as seen by the hair pipeline

use crate::foundation::math::Mat4;
use crate::geometry::{HairGeometry, StrandGeometry};
use crate::material::HairMaterial;

/// Accessor for one mesh of the scene, in submission order
pub trait SceneMesh {
    /// Inactive meshes are uploaded but never voxelized
    fn is_active(&self) -> bool;

    /// Line geometry, if the mesh has any
    fn geometry(&self) -> Option<&dyn HairGeometry>;

    /// Object-to-world transform
    fn model_matrix(&self) -> Mat4;

    /// Hair material; `None` for non-hair meshes
    fn hair_material(&self) -> Option<&HairMaterial>;

    /// Mutable hair material, used to clear its dirty flag
    fn hair_material_mut(&mut self) -> Option<&mut HairMaterial>;

    /// True for an active mesh with geometry and a hair material
    fn is_hair(&self) -> bool {
        self.is_active() && self.geometry().is_some() && self.hair_material().is_some()
    }
}

/// Concrete mesh holding strand geometry and an optional hair material
#[derive(Debug, Clone)]
pub struct HairMesh {
    /// Debug name
    pub name: String,
    /// Line geometry
    pub geometry: Option<StrandGeometry>,
    /// Object-to-world transform
    pub transform: Mat4,
    /// Hair material
    pub material: Option<HairMaterial>,
    /// Whether the mesh takes part in the frame
    pub active: bool,
}

impl HairMesh {
    /// Active hair mesh with an identity transform
    pub fn new(name: impl Into<String>, geometry: StrandGeometry, material: HairMaterial) -> Self {
        Self {
            name: name.into(),
            geometry: Some(geometry),
            transform: Mat4::identity(),
            material: Some(material),
            active: true,
        }
    }

    /// A mesh without hair material, which the pipeline uploads but skips
    pub fn without_material(name: impl Into<String>, geometry: Option<StrandGeometry>) -> Self {
        Self {
            name: name.into(),
            geometry,
            transform: Mat4::identity(),
            material: None,
            active: true,
        }
    }

    /// Set the transform
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Set the active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

impl SceneMesh for HairMesh {
    fn is_active(&self) -> bool {
        self.active
    }

    fn geometry(&self) -> Option<&dyn HairGeometry> {
        self.geometry.as_ref().map(|g| g as &dyn HairGeometry)
    }

    fn model_matrix(&self) -> Mat4 {
        self.transform
    }

    fn hair_material(&self) -> Option<&HairMaterial> {
        self.material.as_ref()
    }

    fn hair_material_mut(&mut self) -> Option<&mut HairMaterial> {
        self.material.as_mut()
    }
}

/// Index of the first mesh that is voxelized this frame.
///
/// Only one hair volume exists per frame; later hair meshes are ignored.
pub fn first_hair_mesh<M: SceneMesh>(meshes: &[M]) -> Option<usize> {
    meshes.iter().position(|mesh| mesh.is_hair())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn strand() -> StrandGeometry {
        StrandGeometry::from_strands([[Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0)]])
    }

    #[test]
    fn test_first_hair_mesh_skips_non_hair() {
        let meshes = vec![
            HairMesh::without_material("body", Some(strand())),
            HairMesh::new("inactive", strand(), HairMaterial::default()).with_active(false),
            HairMesh::new("hair", strand(), HairMaterial::default()),
            HairMesh::new("beard", strand(), HairMaterial::default()),
        ];
        assert_eq!(first_hair_mesh(&meshes), Some(2));
    }

    #[test]
    fn test_no_hair_mesh() {
        let meshes = vec![HairMesh::without_material("body", None)];
        assert_eq!(first_hair_mesh(&meshes), None);
        assert_eq!(first_hair_mesh::<HairMesh>(&[]), None);
    }
}
