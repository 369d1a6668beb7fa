//! Unit tests for explicit_context.rs
//!
//! Drives ExplicitContext over MockGraphicsDevice and checks the recorded
//! command stream and the live-object counters.

use crate::attachments::{AttachmentOps, AttachmentsOperations, LoadOp, StoreOp};
use crate::buffer::{BufferResource, BufferTarget};
use crate::config::{ApiVersion, Config};
use crate::context::{ContextState, GraphicsContext};
use crate::device::{AcquireStatus, PresentStatus, SubmitStatus, WaitStatus};
use crate::explicit_context::{ExplicitContext, DEFAULT_STENCIL_REFERENCE};
use crate::framebuffer::{RenderTarget, TargetId};
use crate::handlers::{FrameInfo, HandlerType};
use crate::mock_graphics_device::{MockAttachment, MockBuffer, MockGraphicsDevice, MockProgram};
use crate::param_descriptor::ParamDescriptor;
use crate::render_state::{PipelineKey, RenderPassId, SamplerKey};
use crate::types::{ClearBits, Extent2D, TextureFilter, TextureFormat, TextureWrapping, Viewport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type MockContext = ExplicitContext<MockGraphicsDevice>;

// ============================================================================
// HELPERS
// ============================================================================

fn context_with(config: Config) -> MockContext {
    let mut ctx = ExplicitContext::new(MockGraphicsDevice::new(), config);
    ctx.init(ApiVersion::new(1, 0)).unwrap();
    ctx.attach_surface(Extent2D::new(800, 600)).unwrap();
    ctx.device().take_commands();
    ctx
}

fn ready_context() -> MockContext {
    context_with(Config::default())
}

fn begin(ctx: &mut MockContext) {
    assert!(ctx.begin_frame().unwrap(), "frame should begin");
}

fn offscreen_target(id: u64, size: u32) -> RenderTarget<MockAttachment> {
    RenderTarget {
        id: TargetId(id),
        extent: Extent2D::new(size, size),
        color: MockAttachment { id: 7 },
        color_format: TextureFormat::R8G8B8A8_UNORM,
        depth_stencil: Some((MockAttachment { id: 8 }, TextureFormat::D24_UNORM_S8_UINT)),
    }
}

fn quad_buffers(ctx: &MockContext) -> (BufferResource<MockBuffer>, BufferResource<MockBuffer>) {
    let mut vertices = BufferResource::new(ctx.device(), BufferTarget::Vertex, 12, 4).unwrap();
    vertices.upload_data(&[[0.0f32; 3]; 4]).unwrap();
    let mut indices = BufferResource::new(ctx.device(), BufferTarget::Index, 2, 6).unwrap();
    indices.upload_data(&[0u16, 1, 2, 2, 3, 0]).unwrap();
    (vertices, indices)
}

fn draw_quad(ctx: &mut MockContext) {
    let (vertices, indices) = quad_buffers(ctx);
    ctx.draw_indexed(&vertices, &indices).unwrap();
}

fn last_render_pass_ops(ctx: &MockContext) -> AttachmentsOperations {
    ctx.device().render_pass_descs.borrow().last().unwrap().ops
}

// ============================================================================
// INIT / SURFACE
// ============================================================================

#[test]
fn test_init_allocates_fixed_resources() {
    let mut ctx = ExplicitContext::new(MockGraphicsDevice::new(), Config::default());
    assert_eq!(ctx.state(), ContextState::Uninitialized);

    ctx.init(ApiVersion::new(1, 3)).unwrap();

    assert_eq!(ctx.state(), ContextState::Ready);
    assert_eq!(ctx.api_version(), Some(ApiVersion::new(1, 3)));
    assert_eq!(ctx.renderer_name(), "Mock Renderer");
    assert_eq!(ctx.staging_buffer().unwrap().capacity(), Config::default().staging_buffer_size);
    assert_eq!(ctx.device().count("create_command_pool"), 1);
    assert_eq!(ctx.device().count("create_sync_primitives"), 1);
}

#[test]
#[should_panic(expected = "initialized twice")]
fn test_double_init_panics() {
    let mut ctx = ready_context();
    ctx.init(ApiVersion::new(1, 0)).unwrap();
}

#[test]
fn test_attach_surface_builds_swapchain_chain() {
    let ctx = ready_context();
    let counters = &ctx.device().counters;

    assert_eq!(ctx.swapchain_image_count(), 3);
    assert_eq!(ctx.swapchain_extent(), Extent2D::new(800, 600));
    assert_eq!(counters.swapchains_created(), 1);
    assert_eq!(counters.image_views_live(), 3);
    assert_eq!(counters.depth_attachments_created(), 1);
    assert_eq!(counters.command_buffer_sets_created(), 1);
    assert_eq!(ctx.device().depth_extent(), Some(Extent2D::new(800, 600)));
}

#[test]
fn test_begin_frame_without_surface_returns_false() {
    let mut ctx = ExplicitContext::new(MockGraphicsDevice::new(), Config::default());
    ctx.init(ApiVersion::new(1, 0)).unwrap();

    assert!(!ctx.begin_frame().unwrap());
    assert_eq!(ctx.state(), ContextState::Ready);
}

#[test]
fn test_begin_frame_when_present_unavailable_returns_false() {
    let mut ctx = ready_context();
    ctx.set_present_available(false);

    assert!(!ctx.begin_frame().unwrap());
    assert!(ctx.device().commands().is_empty());

    ctx.set_present_available(true);
    assert!(ctx.begin_frame().unwrap());
}

#[test]
fn test_detach_surface_releases_swapchain() {
    let mut ctx = ready_context();
    ctx.detach_surface().unwrap();

    assert_eq!(ctx.device().counters.image_views_live(), 0);
    assert_eq!(ctx.device().depth_extent(), None);
    assert!(!ctx.begin_frame().unwrap());
}

// ============================================================================
// FRAME PROTOCOL
// ============================================================================

#[test]
fn test_begin_frame_command_order() {
    let mut ctx = ready_context();
    begin(&mut ctx);

    assert_eq!(
        ctx.device().commands(),
        vec!["wait_frame_fence", "acquire_next_image", "reset_frame_fence", "begin_command_buffers"]
    );
    assert_eq!(ctx.state(), ContextState::FrameActive);
}

#[test]
#[should_panic(expected = "begin_frame called outside Ready state")]
fn test_begin_frame_twice_panics() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    let _ = ctx.begin_frame();
}

#[test]
fn test_present_command_order() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "main").unwrap();
    ctx.device().take_commands();

    ctx.present().unwrap();

    assert_eq!(
        ctx.device().commands(),
        vec![
            "end_render_pass",
            "pop_debug_label",
            "end_command_buffers",
            "submit",
            "present:0",
            "wait_queue_idle",
        ]
    );
    assert_eq!(ctx.state(), ContextState::Ready);
    assert_eq!(ctx.stats().presented_frames, 1);
}

#[test]
fn test_handlers_run_in_registration_order() {
    let mut ctx = ready_context();
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in ["pre-a", "pre-b"] {
        let log = Arc::clone(&log);
        ctx.register_handler(
            HandlerType::PrePresent,
            Box::new(move |info: &FrameInfo| log.lock().unwrap().push(format!("{}:{}", tag, info.frame_index))),
        );
    }
    let post_log = Arc::clone(&log);
    let post = ctx.register_handler(
        HandlerType::PostPresent,
        Box::new(move |info: &FrameInfo| post_log.lock().unwrap().push(format!("post:{}", info.frame_index))),
    );

    begin(&mut ctx);
    ctx.present().unwrap();

    assert!(ctx.unregister_handler(post));
    begin(&mut ctx);
    ctx.present().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["pre-a:1", "pre-b:1", "post:1", "pre-a:2", "pre-b:2"]
    );
}

#[test]
fn test_present_resets_per_frame_state() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(true, "").unwrap();
    ctx.set_program(Arc::new(MockProgram::new(3)));
    ctx.set_blending_enabled(true);
    ctx.set_stencil_reference_value(42);
    ctx.apply_param_descriptor(ParamDescriptor::DynamicUniformBuffer {
        binding: 0,
        buffer: 9,
        range: 64,
        dynamic_offset: 256,
    });
    assert_eq!(ctx.current_dynamic_buffer_offset(), Some(256));

    ctx.present().unwrap();

    assert_eq!(ctx.stencil_reference_value(), DEFAULT_STENCIL_REFERENCE);
    assert_eq!(*ctx.pipeline_key(), PipelineKey::default());
    assert!(ctx.param_descriptors().is_empty());
    assert_eq!(ctx.current_dynamic_buffer_offset(), None);
    assert_eq!(ctx.pending_attachment_bits(), (ClearBits::empty(), ClearBits::empty()));
}

// ============================================================================
// CLEAR / LOAD-STORE
// ============================================================================

#[test]
fn test_clear_color_only_offscreen_ops() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(1, 64))).unwrap();

    ctx.clear(ClearBits::COLOR, ClearBits::COLOR);
    ctx.apply_framebuffer(false, "offscreen").unwrap();

    let ops = last_render_pass_ops(&ctx);
    assert_eq!(ops.color, AttachmentOps { load: LoadOp::Clear, store: StoreOp::Store });
    assert_eq!(ops.depth, AttachmentOps { load: LoadOp::DontCare, store: StoreOp::DontCare });
    assert_eq!(ops.stencil, AttachmentOps { load: LoadOp::DontCare, store: StoreOp::DontCare });
    assert!(!ctx.device().render_pass_descs.borrow().last().unwrap().presentable);
    assert_eq!(ctx.pending_attachment_bits(), (ClearBits::empty(), ClearBits::empty()));
}

#[test]
fn test_clear_on_load_clears_every_attachment() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(1, 64))).unwrap();

    ctx.apply_framebuffer(true, "").unwrap();

    let ops = last_render_pass_ops(&ctx);
    assert_eq!(ops.color.load, LoadOp::Clear);
    assert_eq!(ops.depth.load, LoadOp::Clear);
    assert_eq!(ops.stencil.load, LoadOp::Clear);
}

#[test]
fn test_surface_pass_forces_clear_and_presentable_layout() {
    let mut ctx = ready_context();
    begin(&mut ctx);

    ctx.apply_framebuffer(false, "").unwrap();

    let desc = *ctx.device().render_pass_descs.borrow().last().unwrap();
    assert!(desc.presentable);
    assert_eq!(desc.ops.color, AttachmentOps { load: LoadOp::Clear, store: StoreOp::Store });
    assert_eq!(desc.ops.depth.load, LoadOp::Clear);
    assert_eq!(desc.ops.stencil.load, LoadOp::DontCare);
    assert_eq!(desc.depth_stencil_format, Some(TextureFormat::D24_UNORM_S8_UINT));
}

#[test]
fn test_clear_inside_pass_records_immediately() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();

    ctx.clear(ClearBits::DEPTH, ClearBits::empty());

    assert_eq!(ctx.device().count("clear_attachments:2:800x600"), 1);
    assert_eq!(ctx.pending_attachment_bits(), (ClearBits::empty(), ClearBits::empty()));
}

// ============================================================================
// FRAMEBUFFER SWITCHING
// ============================================================================

#[test]
fn test_set_framebuffer_closes_offscreen_pass_with_barrier() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(1, 64))).unwrap();
    ctx.apply_framebuffer(true, "shadow").unwrap();
    ctx.device().take_commands();

    ctx.set_framebuffer(None).unwrap();

    assert_eq!(
        ctx.device().commands(),
        vec!["end_render_pass", "post_render_barrier:7", "pop_debug_label"]
    );
    assert_eq!(ctx.state(), ContextState::FrameActive);
}

#[test]
fn test_apply_framebuffer_sets_stencil_reference_first() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.set_stencil_reference_value(5);
    assert_eq!(ctx.device().count("set_stencil_reference:5"), 0);
    ctx.device().take_commands();

    ctx.apply_framebuffer(false, "").unwrap();
    assert_eq!(ctx.device().commands()[0], "set_stencil_reference:5");

    ctx.set_stencil_reference_value(9);
    assert_eq!(ctx.device().count("set_stencil_reference:9"), 1);
}

#[test]
fn test_offscreen_render_pass_uses_target_extent() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(1, 256))).unwrap();

    ctx.apply_framebuffer(false, "").unwrap();

    assert_eq!(ctx.device().count("begin_render_pass:offscreen:7:256x256"), 1);
}

// ============================================================================
// SWAPCHAIN RECREATION
// ============================================================================

#[test]
fn test_out_of_date_acquire_recreates_once() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();
    ctx.present().unwrap();

    ctx.device_mut().acquire_results.push_back(AcquireStatus::OutOfDate);
    begin(&mut ctx);

    let counters = Arc::clone(&ctx.device().counters);
    assert_eq!(counters.swapchains_created(), 2);
    assert_eq!(counters.depth_attachments_created(), 2);
    assert_eq!(counters.command_buffer_sets_created(), 2);
    assert_eq!(counters.image_views_live(), 3);
    assert_eq!(ctx.device().count("acquire_next_image"), 3);

    ctx.apply_framebuffer(false, "").unwrap();
    assert_eq!(counters.framebuffers_live(), 3);
    assert_eq!(counters.render_passes_live(), 1);
}

#[test]
fn test_out_of_date_twice_skips_frame() {
    let mut ctx = ready_context();
    ctx.device_mut().acquire_results.extend([AcquireStatus::OutOfDate, AcquireStatus::OutOfDate]);

    assert!(!ctx.begin_frame().unwrap());
    assert_eq!(ctx.state(), ContextState::Ready);
    assert_eq!(ctx.device().counters.swapchains_created(), 2);

    begin(&mut ctx);
}

#[test]
fn test_suboptimal_acquire_recreates_after_present() {
    let mut ctx = ready_context();
    ctx.device_mut().acquire_results.push_back(AcquireStatus::Suboptimal(1));

    begin(&mut ctx);
    assert_eq!(ctx.device().counters.swapchains_created(), 1);

    ctx.present().unwrap();
    assert_eq!(ctx.device().count("present:1"), 1);
    assert_eq!(ctx.device().counters.swapchains_created(), 2);
}

#[test]
fn test_out_of_date_present_recreates() {
    let mut ctx = ready_context();
    ctx.device_mut().present_results.push_back(PresentStatus::OutOfDate);

    begin(&mut ctx);
    ctx.present().unwrap();

    assert_eq!(ctx.stats().swapchain_recreations, 2);
    assert_eq!(ctx.device().counters.image_views_live(), 3);
}

#[test]
fn test_resize_never_reuses_render_pass_id() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();
    ctx.set_program(Arc::new(MockProgram::new(1)));
    draw_quad(&mut ctx);
    let first = ctx.pipeline_key().render_pass;
    ctx.present().unwrap();

    ctx.resize(1024, 768).unwrap();
    assert_eq!(ctx.device().counters.pipelines_live(), 0);

    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();
    let second = ctx.pipeline_key().render_pass;

    assert!(second > first);
    assert_ne!(second, RenderPassId::default());
    assert_eq!(ctx.swapchain_extent(), Extent2D::new(1024, 768));
    assert_eq!(ctx.device().count("begin_render_pass:swapchain:0:1024x768"), 1);
}

#[test]
fn test_zero_extent_resize_skips_frames() {
    let mut ctx = ready_context();
    ctx.resize(0, 0).unwrap();
    assert!(!ctx.begin_frame().unwrap());

    ctx.resize(640, 480).unwrap();
    begin(&mut ctx);
    assert_eq!(ctx.swapchain_extent(), Extent2D::new(640, 480));
}

// ============================================================================
// DEVICE LOST
// ============================================================================

#[test]
fn test_device_lost_fence_wait_continues() {
    let mut ctx = ready_context();
    ctx.device_mut().fence_results.push_back(WaitStatus::DeviceLost);

    begin(&mut ctx);
}

#[test]
fn test_device_lost_acquire_skips_frame() {
    let mut ctx = ready_context();
    ctx.device_mut().acquire_results.push_back(AcquireStatus::DeviceLost);

    assert!(!ctx.begin_frame().unwrap());
    assert_eq!(ctx.device().count("reset_frame_fence"), 0);
}

#[test]
fn test_device_lost_submit_skips_present() {
    let mut ctx = ready_context();
    ctx.device_mut().submit_results.push_back(SubmitStatus::DeviceLost);
    ctx.device_mut().queue_idle_results.push_back(WaitStatus::DeviceLost);

    begin(&mut ctx);
    ctx.present().unwrap();

    assert_eq!(ctx.device().count("present:0"), 0);
    assert_eq!(ctx.device().count("wait_queue_idle"), 1);
    assert_eq!(ctx.state(), ContextState::Ready);
}

// ============================================================================
// PIPELINE / SAMPLER CACHES
// ============================================================================

#[test]
fn test_equal_state_returns_same_pipeline() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();
    ctx.set_program(Arc::new(MockProgram::new(1)));

    let a = ctx.current_pipeline().unwrap();
    let b = ctx.current_pipeline().unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    ctx.set_blending_enabled(true);
    let c = ctx.current_pipeline().unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert!(c.key.blending_enabled);
}

#[test]
fn test_identical_frames_create_nothing_new() {
    let mut ctx = ready_context();
    let program = Arc::new(MockProgram::new(1));

    for _ in 0..2 {
        begin(&mut ctx);
        ctx.apply_framebuffer(true, "").unwrap();
        ctx.set_program(Arc::clone(&program));
        ctx.set_depth_test_enabled(true);
        draw_quad(&mut ctx);
        ctx.present().unwrap();
    }

    let stats = ctx.stats();
    assert_eq!(ctx.device().counters.pipelines_created(), 1);
    assert_eq!(ctx.device().counters.depth_stencil_states_created(), 1);
    assert_eq!(stats.render_pass_creations, 1);
    assert_eq!(stats.framebuffer_creations, 3);
    assert_eq!(stats.pipelines.hits, 1);
}

#[test]
fn test_texture_params_share_sampler() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();
    ctx.set_program(Arc::new(MockProgram::new(1)));
    let sampler = SamplerKey::new(TextureFilter::Nearest, TextureWrapping::Repeat, TextureWrapping::Repeat);
    for binding in 1..=2 {
        ctx.apply_param_descriptor(ParamDescriptor::Texture { binding, texture: binding, sampler });
    }

    draw_quad(&mut ctx);

    assert_eq!(ctx.device().counters.samplers_live(), 1);
    assert_eq!(ctx.device().count("bind_params:2"), 1);
    assert!(Arc::ptr_eq(&ctx.get_sampler(&sampler).unwrap(), &ctx.get_sampler(&sampler).unwrap()));
}

// ============================================================================
// DRAW
// ============================================================================

#[test]
fn test_draw_records_bindings() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();
    ctx.set_program(Arc::new(MockProgram::new(1)));
    ctx.apply_param_descriptor(ParamDescriptor::UniformBuffer { binding: 0, buffer: 4, offset: 0, range: 64 });
    ctx.device().take_commands();

    draw_quad(&mut ctx);
    draw_quad(&mut ctx);

    let commands = ctx.device().commands();
    assert_eq!(&commands[..5], &[
        "create_pipeline",
        "bind_pipeline",
        "bind_params:1",
        "bind_vertex_buffer",
        "bind_index_buffer:U16",
    ]);
    assert_eq!(ctx.device().count("draw_indexed:6"), 2);
    assert_eq!(ctx.device().count("bind_pipeline"), 1);
}

#[test]
#[should_panic(expected = "No program")]
fn test_draw_without_program_panics() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(false, "").unwrap();
    draw_quad(&mut ctx);
}

#[test]
#[should_panic(expected = "without an open render pass")]
fn test_draw_outside_render_pass_panics() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.set_program(Arc::new(MockProgram::new(1)));
    draw_quad(&mut ctx);
}

#[test]
fn test_viewport_is_deferred_until_frame() {
    let mut ctx = ready_context();
    ctx.set_viewport(Viewport::new(0, 0, 320, 240));
    assert_eq!(ctx.device().count("set_viewport:320x240"), 0);

    begin(&mut ctx);
    assert_eq!(ctx.device().count("set_viewport:320x240"), 1);
}

#[test]
fn test_pass_without_viewport_covers_its_target() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.apply_framebuffer(true, "").unwrap();
    assert_eq!(ctx.device().count("set_viewport:800x600"), 1);

    ctx.set_framebuffer(Some(offscreen_target(1, 64))).unwrap();
    ctx.apply_framebuffer(true, "").unwrap();
    assert_eq!(ctx.device().count("set_viewport:64x64"), 1);
}

#[test]
fn test_scene_viewport_survives_pass_changes() {
    let mut ctx = ready_context();
    ctx.set_viewport(Viewport::new(0, 0, 320, 240));
    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(1, 64))).unwrap();
    ctx.apply_framebuffer(true, "").unwrap();

    assert_eq!(ctx.device().count("set_viewport:64x64"), 0);
    assert_eq!(ctx.device().count("set_viewport:320x240"), 1);
}

// ============================================================================
// DEFERRED DESTRUCTION
// ============================================================================

#[test]
fn test_offscreen_resize_retires_old_objects() {
    let mut ctx = ready_context();
    let program = Arc::new(MockProgram::new(1));

    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(1, 64))).unwrap();
    ctx.apply_framebuffer(true, "").unwrap();
    ctx.set_program(Arc::clone(&program));
    draw_quad(&mut ctx);
    ctx.present().unwrap();

    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(1, 128))).unwrap();
    ctx.apply_framebuffer(true, "").unwrap();
    ctx.present().unwrap();

    let counters = &ctx.device().counters;
    assert_eq!(counters.render_passes_live(), 1);
    assert_eq!(counters.framebuffers_live(), 1);
    assert_eq!(counters.pipelines_live(), 0);

    let objects = ctx.stats().objects;
    assert_eq!(objects.retired, 3);
    assert_eq!(objects.destroyed_sync, 3);
    assert_eq!(objects.pending, 0);
}

#[test]
fn test_remove_render_target_retires_entry() {
    let mut ctx = ready_context();
    begin(&mut ctx);
    ctx.set_framebuffer(Some(offscreen_target(5, 64))).unwrap();
    ctx.apply_framebuffer(false, "").unwrap();
    ctx.present().unwrap();

    ctx.remove_render_target(TargetId(5));
    assert_eq!(ctx.device().counters.render_passes_live(), 1);

    begin(&mut ctx);
    ctx.present().unwrap();
    assert_eq!(ctx.device().counters.render_passes_live(), 0);
}

#[test]
fn test_staging_growth_retires_old_buffer() {
    let config = Config { staging_buffer_size: 64, ..Config::default() };
    let mut ctx = context_with(config);
    begin(&mut ctx);

    let region = ctx.stage_data(&[1u8; 100]).unwrap();

    assert_eq!(region.offset, 0);
    assert_eq!(ctx.staging_buffer().unwrap().capacity(), 256);
    assert_eq!(ctx.device().count("create_host_buffer:256"), 1);

    ctx.present().unwrap();
    assert_eq!(ctx.staging_buffer().unwrap().used(), 0);
    assert_eq!(ctx.stats().objects.retired, 1);
    assert_eq!(ctx.stats().objects.pending, 0);
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_async_collection_runs_every_period() {
    let config = Config { sync_collect_budget: 0, async_collect_period: 2, ..Config::default() };
    let mut ctx = context_with(config);
    let drops = Arc::new(AtomicUsize::new(0));

    begin(&mut ctx);
    ctx.retire_object(DropCounter(Arc::clone(&drops)));
    ctx.present().unwrap();
    ctx.wait_for_async_collection();
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.stats().objects.pending, 1);

    begin(&mut ctx);
    ctx.present().unwrap();
    ctx.wait_for_async_collection();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.stats().objects.destroyed_async, 1);
}
