//! Shader parameter bindings accumulated for the next draw call

use crate::render_state::SamplerKey;

/// One shader binding instance
///
/// `B` is the backend buffer handle, `T` the backend texture handle.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDescriptor<B, T> {
    /// Region of a uniform buffer
    UniformBuffer {
        binding: u32,
        buffer: B,
        offset: u64,
        range: u64,
    },
    /// Uniform buffer bound with a per-draw dynamic offset
    DynamicUniformBuffer {
        binding: u32,
        buffer: B,
        range: u64,
        dynamic_offset: u32,
    },
    /// Sampled texture
    Texture {
        binding: u32,
        texture: T,
        sampler: SamplerKey,
    },
}

impl<B, T> ParamDescriptor<B, T> {
    pub fn binding(&self) -> u32 {
        match self {
            ParamDescriptor::UniformBuffer { binding, .. }
            | ParamDescriptor::DynamicUniformBuffer { binding, .. }
            | ParamDescriptor::Texture { binding, .. } => *binding,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamDescriptor::DynamicUniformBuffer { .. })
    }
}

/// Parameters for the current draw call
///
/// A descriptor replaces whatever is bound at its binding slot. A dynamic
/// uniform buffer also replaces the previous dynamic one, so the set never
/// holds more than one.
#[derive(Debug, Clone)]
pub struct ParamDescriptorSet<B, T> {
    params: Vec<ParamDescriptor<B, T>>,
}

impl<B, T> ParamDescriptorSet<B, T> {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    pub fn apply(&mut self, descriptor: ParamDescriptor<B, T>) {
        let dynamic = descriptor.is_dynamic();
        let binding = descriptor.binding();
        let conflicts = |p: &ParamDescriptor<B, T>| p.binding() == binding || (dynamic && p.is_dynamic());

        match self.params.iter().position(|p| conflicts(p)) {
            Some(index) => {
                self.params[index] = descriptor;
                // A dynamic write can collide with two entries: the old dynamic one and its binding
                let mut current = 0;
                self.params.retain(|p| {
                    let keep = current == index || !conflicts(p);
                    current += 1;
                    keep
                });
            }
            None => self.params.push(descriptor),
        }
    }

    /// Offset of the dynamic uniform buffer, if one is bound
    pub fn dynamic_offset(&self) -> Option<u32> {
        self.params.iter().find_map(|p| match p {
            ParamDescriptor::DynamicUniformBuffer { dynamic_offset, .. } => Some(*dynamic_offset),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    pub fn as_slice(&self) -> &[ParamDescriptor<B, T>] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<B, T> Default for ParamDescriptorSet<B, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "param_descriptor_tests.rs"]
mod tests;
