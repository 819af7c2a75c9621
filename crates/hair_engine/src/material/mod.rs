//! Hair scattering materials and their uniform encoding
//!
//! A [`HairMaterial`] is one of several fiber scattering models. Every model
//! owns its parameters, tracks whether they changed since the scattering LUTs
//! were last computed, and encodes itself into an [`EncodedUniformBlock`].

pub mod hair;
pub mod hair_disney;
pub mod hair_stylized;
pub mod uniforms;

pub use hair::MarschnerHair;
pub use hair_disney::{DisneyHair, DisneyLobe, LobeTint};
pub use hair_stylized::StylizedHair;
pub use uniforms::{EncodedUniformBlock, MAX_UNIFORM_SLOTS};

/// Scattering model tag shared with the GPU kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HairMaterialKind {
    /// [`MarschnerHair`]
    Marschner,
    /// [`DisneyHair`]
    Disney,
    /// [`StylizedHair`]
    Stylized,
}

impl HairMaterialKind {
    /// Numeric id uploaded with every object
    pub fn type_id(self) -> u32 {
        match self {
            Self::Marschner => 3,
            Self::Disney => 5,
            Self::Stylized => 6,
        }
    }

    /// Inverse of [`HairMaterialKind::type_id`]
    pub fn from_type_id(id: u32) -> Option<Self> {
        match id {
            3 => Some(Self::Marschner),
            5 => Some(Self::Disney),
            6 => Some(Self::Stylized),
            _ => None,
        }
    }

    /// Slots used by the model's layout
    pub fn slot_count(self) -> usize {
        match self {
            Self::Marschner => MarschnerHair::SLOT_COUNT,
            Self::Disney => DisneyHair::SLOT_COUNT,
            Self::Stylized => StylizedHair::SLOT_COUNT,
        }
    }
}

/// A hair material instance
#[derive(Debug, Clone, PartialEq)]
pub enum HairMaterial {
    /// Physically based Marschner model
    Marschner(MarschnerHair),
    /// Artist-directed Disney model
    Disney(DisneyHair),
    /// Base-color stylized model
    Stylized(StylizedHair),
}

impl HairMaterial {
    /// Model tag
    pub fn kind(&self) -> HairMaterialKind {
        match self {
            Self::Marschner(_) => HairMaterialKind::Marschner,
            Self::Disney(_) => HairMaterialKind::Disney,
            Self::Stylized(_) => HairMaterialKind::Stylized,
        }
    }

    /// Encode the current parameters
    pub fn encode(&self) -> EncodedUniformBlock {
        match self {
            Self::Marschner(m) => m.encode(),
            Self::Disney(m) => m.encode(),
            Self::Stylized(m) => m.encode(),
        }
    }

    /// True when parameters changed since the last [`HairMaterial::mark_clean`]
    pub fn is_dirty(&self) -> bool {
        match self {
            Self::Marschner(m) => m.is_dirty(),
            Self::Disney(m) => m.is_dirty(),
            Self::Stylized(m) => m.is_dirty(),
        }
    }

    /// Clear the dirty flag once derived data is up to date
    pub fn mark_clean(&mut self) {
        self.set_dirty(false);
    }

    /// Force derived data to be recomputed
    pub fn mark_dirty(&mut self) {
        self.set_dirty(true);
    }

    fn set_dirty(&mut self, dirty: bool) {
        match self {
            Self::Marschner(m) => m.set_dirty(dirty),
            Self::Disney(m) => m.set_dirty(dirty),
            Self::Stylized(m) => m.set_dirty(dirty),
        }
    }
}

impl Default for HairMaterial {
    fn default() -> Self {
        Self::Marschner(MarschnerHair::default())
    }
}

impl From<MarschnerHair> for HairMaterial {
    fn from(model: MarschnerHair) -> Self {
        Self::Marschner(model)
    }
}

impl From<DisneyHair> for HairMaterial {
    fn from(model: DisneyHair) -> Self {
        Self::Disney(model)
    }
}

impl From<StylizedHair> for HairMaterial {
    fn from(model: StylizedHair) -> Self {
        Self::Stylized(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_materials_start_dirty() {
        let mut material = HairMaterial::default();
        assert!(material.is_dirty());
        material.mark_clean();
        assert!(!material.is_dirty());
        material.mark_dirty();
        assert!(material.is_dirty());
    }

    #[test]
    fn test_kind_ids_round_trip() {
        for material in [
            HairMaterial::from(MarschnerHair::new()),
            HairMaterial::from(DisneyHair::new()),
            HairMaterial::from(StylizedHair::new()),
        ] {
            let kind = material.kind();
            assert_eq!(HairMaterialKind::from_type_id(kind.type_id()), Some(kind));
            assert!(kind.slot_count() <= MAX_UNIFORM_SLOTS);
            assert_eq!(material.encode(), material.encode());
        }
        assert_eq!(HairMaterialKind::from_type_id(0), None);
    }

    #[test]
    fn test_encode_dispatches_to_variant() {
        let disney = DisneyHair::new();
        assert_eq!(HairMaterial::from(disney.clone()).encode(), disney.encode());
    }
}
