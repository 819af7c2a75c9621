//! Host-visible buffers
//!
//! Uniform and storage buffers stay persistently mapped; writes are plain
//! copies into coherent memory.

use ash::{vk, Device};

use super::convert;
use crate::error::{HairError, HairResult};
use crate::render::image::BufferDesc;

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a mapped buffer
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &BufferDesc,
    ) -> HairResult<Self> {
        let size = desc.size.max(1);
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(convert::buffer_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(HairError::Api)?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = match find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(HairError::Api(e));
            }
        };

        let mapped = unsafe {
            device
                .bind_buffer_memory(buffer, memory, 0)
                .and_then(|_| device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()))
        };
        let mapped = match mapped {
            Ok(ptr) => ptr.cast::<u8>(),
            Err(e) => {
                unsafe {
                    device.destroy_buffer(buffer, None);
                    device.free_memory(memory, None);
                }
                return Err(HairError::Api(e));
            }
        };

        Ok(Self {
            device,
            buffer,
            memory,
            mapped,
            size,
        })
    }

    /// Copy `data` to `offset`
    pub fn write(&mut self, offset: u64, data: &[u8]) -> HairResult<()> {
        let end = offset + data.len() as u64;
        if end > self.size {
            return Err(HairError::invalid_operation(format!(
                "write of {} bytes at {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            )));
        }
        // SAFETY: the mapping covers [0, size) and the range was checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.unmap_memory(self.memory);
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// First memory type allowed by `type_filter` that has every flag of `properties`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> HairResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            type_filter & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or(HairError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties() -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        properties.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        properties.memory_types[2].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL
            | vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT;
        properties
    }

    #[test]
    fn test_find_memory_type() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type(&properties(), 0b111, host).unwrap(), 1);
        assert_eq!(find_memory_type(&properties(), 0b100, host).unwrap(), 2);
        assert_eq!(
            find_memory_type(&properties(), 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert!(matches!(
            find_memory_type(&properties(), 0b001, host),
            Err(HairError::NoSuitableMemoryType)
        ));
    }
}
