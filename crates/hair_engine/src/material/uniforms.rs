//! GPU layout of encoded hair material parameters

/// Number of vec4 slots reserved for every hair material block
pub const MAX_UNIFORM_SLOTS: usize = 8;

/// Fixed-size material uniform block.
///
/// Each model writes its parameters into the leading slots in a model-specific,
/// append-only order; unused slots stay zero. Size is 128 bytes, std140 compatible.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncodedUniformBlock {
    /// Parameter slots
    pub slots: [[f32; 4]; MAX_UNIFORM_SLOTS],
}

unsafe impl bytemuck::Pod for EncodedUniformBlock {}
unsafe impl bytemuck::Zeroable for EncodedUniformBlock {}

impl EncodedUniformBlock {
    /// All slots zero
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// Read a slot
    pub fn slot(&self, index: usize) -> [f32; 4] {
        self.slots[index]
    }

    /// Write a slot; used by the encoders
    pub(crate) fn set(&mut self, index: usize, value: [f32; 4]) {
        self.slots[index] = value;
    }

    /// Raw bytes for buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Pack a flag the way shaders read it
pub(crate) fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_layout() {
        assert_eq!(std::mem::size_of::<EncodedUniformBlock>(), 128);
        assert_eq!(std::mem::align_of::<EncodedUniformBlock>(), 16);

        let mut block = EncodedUniformBlock::zeroed();
        block.set(1, [1.0, 2.0, 3.0, 4.0]);
        let bytes = block.as_bytes();
        assert_eq!(bytes.len(), 128);
        assert_eq!(&bytes[16..20], &1.0f32.to_ne_bytes());
    }
}
