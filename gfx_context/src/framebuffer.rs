//! Framebuffer / render pass manager
//!
//! One entry per logical render target (the presentation surface or an
//! offscreen target). An entry keeps:
//! - one render pass per attachment load/store combination
//! - the framebuffers (one per swapchain image for the surface, one for an
//!   offscreen target), built once and compatible with every render pass of
//!   the entry
//! - the signature (extent and formats) they were built for
//!
//! When a target's signature changes the entry is retired and rebuilt.
//! Render pass ids are never reused, so a pipeline keyed by a retired render
//! pass can never be returned again.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::attachments::{AttachmentsOperations, LoadOp, StoreOp};
use crate::device::{FramebufferSource, GraphicsDevice, RenderPassDesc};
use crate::error::Result;
use crate::render_state::RenderPassId;
use crate::types::{Extent2D, TextureFormat};

/// Identity of an offscreen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

/// Cache key of a framebuffer entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferKey {
    Surface,
    Offscreen(TargetId),
}

/// Offscreen render target, as seen by the context for one frame
#[derive(Debug, Clone)]
pub struct RenderTarget<A> {
    pub id: TargetId,
    pub extent: Extent2D,
    pub color: A,
    pub color_format: TextureFormat,
    pub depth_stencil: Option<(A, TextureFormat)>,
}

/// What an entry was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSignature {
    pub extent: Extent2D,
    pub color_format: TextureFormat,
    pub depth_stencil_format: Option<TextureFormat>,
    pub framebuffer_count: u32,
}

/// Target to resolve, with whatever is needed to build its objects
pub enum FramebufferTarget<'a, A> {
    /// Presentation surface with `image_count` swapchain images
    Surface {
        extent: Extent2D,
        color_format: TextureFormat,
        depth_stencil_format: TextureFormat,
        image_count: u32,
        image_index: u32,
    },
    Offscreen(&'a RenderTarget<A>),
}

impl<A> FramebufferTarget<'_, A> {
    fn key(&self) -> FramebufferKey {
        match self {
            FramebufferTarget::Surface { .. } => FramebufferKey::Surface,
            FramebufferTarget::Offscreen(target) => FramebufferKey::Offscreen(target.id),
        }
    }

    fn signature(&self) -> TargetSignature {
        match self {
            FramebufferTarget::Surface { extent, color_format, depth_stencil_format, image_count, .. } => {
                TargetSignature {
                    extent: *extent,
                    color_format: *color_format,
                    depth_stencil_format: Some(*depth_stencil_format),
                    framebuffer_count: *image_count,
                }
            }
            FramebufferTarget::Offscreen(target) => TargetSignature {
                extent: target.extent,
                color_format: target.color_format,
                depth_stencil_format: target.depth_stencil.as_ref().map(|(_, format)| *format),
                framebuffer_count: 1,
            },
        }
    }
}

/// Surface passes always clear color/depth, discard stencil and store color
pub fn surface_operations(ops: AttachmentsOperations) -> AttachmentsOperations {
    let mut ops = ops;
    ops.color.load = LoadOp::Clear;
    ops.color.store = StoreOp::Store;
    ops.depth.load = LoadOp::Clear;
    ops.stencil.load = LoadOp::DontCare;
    ops
}

struct FramebufferEntry<D: GraphicsDevice> {
    signature: TargetSignature,
    render_passes: FxHashMap<AttachmentsOperations, (RenderPassId, Arc<D::RenderPass>)>,
    framebuffers: Vec<Arc<D::Framebuffer>>,
}

/// Objects of a retired entry, to be destroyed once no frame uses them
pub struct RetiredFramebuffers<D: GraphicsDevice> {
    pub render_pass_ids: Vec<RenderPassId>,
    pub render_passes: Vec<Arc<D::RenderPass>>,
    pub framebuffers: Vec<Arc<D::Framebuffer>>,
}

/// Render pass and framebuffer to open for the current target
pub struct ResolvedFramebuffer<D: GraphicsDevice> {
    pub render_pass_id: RenderPassId,
    pub render_pass: Arc<D::RenderPass>,
    pub framebuffer: Arc<D::Framebuffer>,
    pub extent: Extent2D,
}

pub struct FramebufferManager<D: GraphicsDevice> {
    entries: FxHashMap<FramebufferKey, FramebufferEntry<D>>,
    next_render_pass_id: u64,
    render_pass_creations: u64,
    framebuffer_creations: u64,
}

impl<D: GraphicsDevice> FramebufferManager<D> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            next_render_pass_id: 1,
            render_pass_creations: 0,
            framebuffer_creations: 0,
        }
    }

    /// Return the render pass and framebuffer for `target` and `ops`,
    /// creating whatever is missing
    ///
    /// If the target's signature changed since its entry was built, the old
    /// entry is handed back for deferred destruction.
    pub fn resolve(
        &mut self,
        device: &D,
        target: &FramebufferTarget<'_, D::Attachment>,
        ops: AttachmentsOperations,
    ) -> Result<(ResolvedFramebuffer<D>, Option<RetiredFramebuffers<D>>)> {
        let key = target.key();
        let signature = target.signature();

        let mut retired = None;
        if let Some(entry) = self.entries.get(&key) {
            if entry.signature != signature {
                crate::gfx_debug!(
                    "gfx::context",
                    "Render target {:?} changed ({:?} -> {:?}), rebuilding",
                    key,
                    entry.signature.extent,
                    signature.extent
                );
                retired = self.entries.remove(&key).map(Self::retire_entry);
            }
        }

        let ops = match target {
            FramebufferTarget::Surface { .. } => surface_operations(ops),
            FramebufferTarget::Offscreen(_) => ops,
        };

        let entry = self.entries.entry(key).or_insert_with(|| FramebufferEntry {
            signature,
            render_passes: FxHashMap::default(),
            framebuffers: Vec::new(),
        });

        let (render_pass_id, render_pass) = match entry.render_passes.get(&ops) {
            Some((id, pass)) => (*id, Arc::clone(pass)),
            None => {
                let desc = RenderPassDesc {
                    color_format: signature.color_format,
                    depth_stencil_format: signature.depth_stencil_format,
                    ops,
                    presentable: key == FramebufferKey::Surface,
                };
                let pass = Arc::new(device.create_render_pass(&desc)?);
                let id = RenderPassId(self.next_render_pass_id);
                self.next_render_pass_id += 1;
                self.render_pass_creations += 1;
                entry.render_passes.insert(ops, (id, Arc::clone(&pass)));
                (id, pass)
            }
        };

        if entry.framebuffers.is_empty() {
            match target {
                FramebufferTarget::Surface { extent, image_count, .. } => {
                    for image_index in 0..*image_count {
                        let framebuffer = device.create_framebuffer(
                            &render_pass,
                            FramebufferSource::Swapchain { image_index },
                            *extent,
                        )?;
                        entry.framebuffers.push(Arc::new(framebuffer));
                    }
                }
                FramebufferTarget::Offscreen(rt) => {
                    let framebuffer = device.create_framebuffer(
                        &render_pass,
                        FramebufferSource::Offscreen {
                            color: &rt.color,
                            depth_stencil: rt.depth_stencil.as_ref().map(|(attachment, _)| attachment),
                        },
                        rt.extent,
                    )?;
                    entry.framebuffers.push(Arc::new(framebuffer));
                }
            }
            self.framebuffer_creations += entry.framebuffers.len() as u64;
        }

        let index = match target {
            FramebufferTarget::Surface { image_index, .. } => *image_index as usize,
            FramebufferTarget::Offscreen(_) => 0,
        };
        assert!(
            index < entry.framebuffers.len(),
            "Swapchain image index {} out of range ({} framebuffers)",
            index,
            entry.framebuffers.len()
        );

        Ok((
            ResolvedFramebuffer {
                render_pass_id,
                render_pass,
                framebuffer: Arc::clone(&entry.framebuffers[index]),
                extent: signature.extent,
            },
            retired,
        ))
    }

    fn retire_entry(entry: FramebufferEntry<D>) -> RetiredFramebuffers<D> {
        let mut render_pass_ids = Vec::with_capacity(entry.render_passes.len());
        let mut render_passes = Vec::with_capacity(entry.render_passes.len());
        for (_, (id, pass)) in entry.render_passes {
            render_pass_ids.push(id);
            render_passes.push(pass);
        }
        RetiredFramebuffers {
            render_pass_ids,
            render_passes,
            framebuffers: entry.framebuffers,
        }
    }

    /// Retire the entry of an offscreen target that is going away
    pub fn remove(&mut self, key: FramebufferKey) -> Option<RetiredFramebuffers<D>> {
        self.entries.remove(&key).map(Self::retire_entry)
    }

    /// Drop every entry; the device must be idle
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, key: FramebufferKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render_pass_creations(&self) -> u64 {
        self.render_pass_creations
    }

    pub fn framebuffer_creations(&self) -> u64 {
        self.framebuffer_creations
    }
}

impl<D: GraphicsDevice> Default for FramebufferManager<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "framebuffer_tests.rs"]
mod tests;
