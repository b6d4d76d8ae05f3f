/// Handles, flags and descriptors exchanged with a GraphicsDevice
///
/// Handles are opaque 64-bit values chosen by the backend. They carry no
/// ownership: the owning wrappers (BufferAllocation, Frame, Swapchain, ...)
/// decide when a handle is destroyed.

use bitflags::bitflags;

// ============================================================================
// HANDLES
// ============================================================================

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u64);

            impl $name {
                /// Handle value that never names a live object
                pub const NULL: Self = Self(0);

                pub fn is_null(&self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_handle!(
    /// GPU buffer
    BufferHandle,
    /// GPU image (owned or swapchain-provided)
    ImageHandle,
    /// Backing memory of a buffer or image
    AllocationHandle,
    ImageViewHandle,
    SamplerHandle,
    CommandPoolHandle,
    CommandBufferHandle,
    SemaphoreHandle,
    FenceHandle,
    DescriptorSetLayoutHandle,
    DescriptorPoolHandle,
    DescriptorSetHandle,
    ShaderModuleHandle,
    PipelineLayoutHandle,
    PipelineHandle,
    RenderPassHandle,
    FramebufferHandle,
    SwapchainHandle,
);

// ============================================================================
// FLAGS
// ============================================================================

bitflags! {
    /// How a buffer is used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
    }
}

bitflags! {
    /// How an image is used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const COLOR_ATTACHMENT = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 4;
    }
}

bitflags! {
    /// Required memory properties of an allocation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
    }
}

bitflags! {
    /// Allocation strategy hints
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AllocationFlags: u32 {
        /// Host writes sequentially into mapped memory (staging, uniforms)
        const HOST_ACCESS_SEQUENTIAL_WRITE = 1 << 0;
        /// Host reads back mapped memory
        const HOST_ACCESS_RANDOM = 1 << 1;
        /// Give the resource its own memory block
        const DEDICATED = 1 << 2;
    }
}

bitflags! {
    /// Shader stages a binding or push constant range is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

bitflags! {
    /// Command pool creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandPoolFlags: u32 {
        /// Command buffers are short-lived
        const TRANSIENT = 1 << 0;
        /// Command buffers may be reset individually
        const RESET_COMMAND_BUFFER = 1 << 1;
    }
}

// ============================================================================
// FORMATS AND LAYOUTS
// ============================================================================

/// Pixel and vertex attribute formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    D32_FLOAT,
    D32_FLOAT_S8_UINT,
    D24_UNORM_S8_UINT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    /// Format reported by the surface that the engine has no name for (raw backend value)
    Other(i32),
}

impl Format {
    /// True for depth (and depth-stencil) formats
    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D32_FLOAT | Format::D32_FLOAT_S8_UINT | Format::D24_UNORM_S8_UINT)
    }

    /// Size of one texel or attribute in bytes (None for opaque formats)
    pub fn bytes_per_element(&self) -> Option<u32> {
        match self {
            Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_SRGB
            | Format::B8G8R8A8_UNORM
            | Format::B8G8R8A8_SRGB
            | Format::D32_FLOAT
            | Format::D24_UNORM_S8_UINT => Some(4),
            Format::D32_FLOAT_S8_UINT | Format::R32G32_SFLOAT => Some(8),
            Format::R32G32B32_SFLOAT => Some(12),
            Format::R32G32B32A32_SFLOAT => Some(16),
            Format::Other(_) => None,
        }
    }
}

/// Color space of a surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    Other(i32),
}

/// Format + color space pair offered by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: Format,
    pub color_space: ColorSpace,
}

/// Presentation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

/// Image layouts used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    TransferDstOptimal,
    ShaderReadOnlyOptimal,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    PresentSrc,
}

/// Image aspect selected by a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAspect {
    Color,
    Depth,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

/// Shader stage of a single module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn flags(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
        }
    }
}

/// Sampler filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Sampler addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Back,
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Width/height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-sized surface
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Viewport transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport with the standard 0..1 depth range
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

/// Attachment clear value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

// ============================================================================
// RESOURCE DESCRIPTORS
// ============================================================================

/// Buffer creation parameters
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name (shows up in allocator reports)
    pub name: String,
    /// Size in bytes (must be > 0)
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryProperties,
    pub flags: AllocationFlags,
}

/// 2D image creation parameters (single mip, single layer, optimal tiling)
#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub usage: ImageUsage,
    pub memory: MemoryProperties,
    pub flags: AllocationFlags,
}

/// 2D image view creation parameters
#[derive(Debug, Clone, Copy)]
pub struct ImageViewDesc {
    pub image: ImageHandle,
    pub format: Format,
    pub aspect: ImageAspect,
}

/// Sampler creation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_mode: AddressMode,
    /// Anisotropic filtering level (None disables it)
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode: AddressMode::Repeat,
            max_anisotropy: None,
        }
    }
}

/// One buffer-to-buffer copy region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// Kind of resource bound at a descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorType {
    UniformBuffer,
    CombinedImageSampler,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: ShaderStageFlags,
}

/// Pool capacity for one descriptor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// Buffer range written into a uniform buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferBinding {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub range: u64,
}

/// Image + sampler written into a combined image sampler binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBinding {
    pub sampler: SamplerHandle,
    pub view: ImageViewHandle,
    pub layout: ImageLayout,
}

/// Resource written by a descriptor update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorResource {
    Buffer(BufferBinding),
    Image(ImageBinding),
}

/// Update of a single binding of a descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub resource: DescriptorResource,
}

// ============================================================================
// PIPELINES AND PASSES
// ============================================================================

/// Push constant range of a pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Pipeline layout creation parameters
#[derive(Debug, Clone, Default)]
pub struct PipelineLayoutDesc {
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// Vertex attribute inside the single interleaved vertex binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: Format,
    pub offset: u32,
}

/// Vertex input state (one interleaved per-vertex binding)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Graphics pipeline creation parameters
///
/// Viewport and scissor are always dynamic state.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    pub vertex_shader: ShaderModuleHandle,
    pub fragment_shader: ShaderModuleHandle,
    pub layout: PipelineLayoutHandle,
    pub render_pass: RenderPassHandle,
    pub vertex_input: VertexInput,
    pub cull_mode: CullMode,
    pub depth_test: bool,
}

/// Single-subpass render pass: one presented color attachment plus depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub color_format: Format,
    pub depth_format: Format,
}

/// Framebuffer creation parameters
#[derive(Debug, Clone)]
pub struct FramebufferDesc {
    pub render_pass: RenderPassHandle,
    pub attachments: Vec<ImageViewHandle>,
    pub extent: Extent2D,
}

// ============================================================================
// SUBMISSION AND PRESENTATION
// ============================================================================

/// Queue submission
///
/// Wait semaphores block the color attachment output stage.
#[derive(Debug, Clone, Copy)]
pub struct SubmitDesc<'a> {
    pub command_buffers: &'a [CommandBufferHandle],
    pub wait_semaphores: &'a [SemaphoreHandle],
    pub signal_semaphores: &'a [SemaphoreHandle],
    pub fence: Option<FenceHandle>,
}

/// Surface capabilities relevant to swapchain creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// None when the surface lets the swapchain pick its size
    pub current_extent: Option<Extent2D>,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
}

/// Everything a surface reports for swapchain creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSupport {
    pub capabilities: SurfaceCapabilities,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

/// Swapchain creation parameters
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: Extent2D,
    pub image_count: u32,
    /// Swapchain being replaced (its images are handed over)
    pub old_swapchain: Option<SwapchainHandle>,
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}
