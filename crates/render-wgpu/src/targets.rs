//! Size-dependent GPU state: render targets, the blur schedule, and the
//! bind groups tying them to the filter passes.
//!
//! Everything here is rebuilt wholesale on resize; the shape-only state
//! (layouts, sampler, parameter buffers) lives in [`FilterChain`] and
//! survives.

use bytemuck::{Pod, Zeroable};
use turntable_render::{BLOOM_LEVELS, BLUR_KERNEL_RADII, BloomSettings, DEFAULT_EXPOSURE};
use wgpu::util::DeviceExt;

/// All intermediate targets render in linear half-float.
pub(crate) const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Width of the luma ramp above the bloom threshold.
const SMOOTH_WIDTH: f32 = 0.01;

/// Extent of one bloom pyramid level. The bright target sits at level 0
/// (half resolution); each further level halves again, rounding up, and
/// never collapses below one texel.
pub(crate) fn level_extent(width: u32, height: u32, level: usize) -> (u32, u32) {
    let mut w = width.max(1);
    let mut h = height.max(1);
    for _ in 0..=level {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
    }
    (w, h)
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct BrightParams {
    pub threshold: f32,
    pub smooth_width: f32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct BlurParams {
    pub direction: [f32; 2],
    pub inv_size: [f32; 2],
    pub sigma: f32,
    pub radius: f32,
    pub _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct CompositeParams {
    pub weights0: [f32; 4],
    pub weights1: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct OutputParams {
    pub exposure: f32,
    pub _pad: [f32; 3],
}

/// Blur pass parameters for a surface size: horizontal then vertical per
/// level, offsets in the level's own texel units.
pub(crate) fn blur_schedule(width: u32, height: u32) -> Vec<BlurParams> {
    let mut schedule = Vec::with_capacity(BLOOM_LEVELS * 2);
    for (level, &radius) in BLUR_KERNEL_RADII.iter().enumerate() {
        let (w, h) = level_extent(width, height, level);
        let inv_size = [1.0 / w as f32, 1.0 / h as f32];
        for direction in [[1.0, 0.0], [0.0, 1.0]] {
            schedule.push(BlurParams {
                direction,
                inv_size,
                sigma: radius as f32,
                radius: radius as f32,
                _pad: [0.0; 2],
            });
        }
    }
    schedule
}

/// Layouts, sampler, and parameter buffers shared by every filter pass.
/// Built once; only the blur parameters are rewritten on resize.
pub(crate) struct FilterChain {
    pub filter_layout: wgpu::BindGroupLayout,
    pub composite_layout: wgpu::BindGroupLayout,
    pub output_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
    pub bright_params: wgpu::Buffer,
    pub blur_params: Vec<wgpu::Buffer>,
    pub composite_params: wgpu::Buffer,
    pub output_params: wgpu::Buffer,
}

impl FilterChain {
    pub(crate) fn new(
        device: &wgpu::Device,
        settings: BloomSettings,
        width: u32,
        height: u32,
    ) -> Self {
        let filter_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter bind group layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite bind group layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                sampler_entry(5),
                uniform_entry(6),
            ],
        });
        let output_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("output bind group layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                uniform_entry(3),
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("filter sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bright_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("bright params"),
            contents: bytemuck::bytes_of(&BrightParams {
                threshold: settings.threshold,
                smooth_width: SMOOTH_WIDTH,
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let blur_params = blur_schedule(width, height)
            .iter()
            .map(|params| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("blur params"),
                    contents: bytemuck::bytes_of(params),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();

        let mut weights0 = [0.0f32; 4];
        let mut weights1 = [0.0f32; 4];
        for level in 0..BLOOM_LEVELS {
            let weight = settings.level_weight(level);
            if level < 4 {
                weights0[level] = weight;
            } else {
                weights1[level - 4] = weight;
            }
        }
        let composite_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("composite params"),
            contents: bytemuck::bytes_of(&CompositeParams { weights0, weights1 }),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let output_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("output params"),
            contents: bytemuck::bytes_of(&OutputParams {
                exposure: DEFAULT_EXPOSURE,
                _pad: [0.0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            filter_layout,
            composite_layout,
            output_layout,
            sampler,
            bright_params,
            blur_params,
            composite_params,
            output_params,
        }
    }

    /// Refresh texel offsets after the pyramid extents changed.
    pub(crate) fn write_blur_params(&self, queue: &wgpu::Queue, width: u32, height: u32) {
        for (buffer, params) in self.blur_params.iter().zip(blur_schedule(width, height)) {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(&params));
        }
    }
}

/// Every render target and filter bind group for one surface size.
pub(crate) struct PassTargets {
    pub extract_view: wgpu::TextureView,
    pub base_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
    pub bright_view: wgpu::TextureView,
    pub horizontal_views: Vec<wgpu::TextureView>,
    pub vertical_views: Vec<wgpu::TextureView>,
    pub bloom_view: wgpu::TextureView,
    pub bright_group: wgpu::BindGroup,
    pub blur_groups: Vec<wgpu::BindGroup>,
    pub composite_group: wgpu::BindGroup,
    pub output_group: wgpu::BindGroup,
}

impl PassTargets {
    pub(crate) fn new(
        device: &wgpu::Device,
        chain: &FilterChain,
        width: u32,
        height: u32,
    ) -> Self {
        let extract_view = color_target(device, "extract scene target", width, height);
        let base_view = color_target(device, "base scene target", width, height);
        let depth_view = depth_target(device, width, height);

        let (half_w, half_h) = level_extent(width, height, 0);
        let bright_view = color_target(device, "bright target", half_w, half_h);
        let bloom_view = color_target(device, "bloom target", half_w, half_h);

        let mut horizontal_views = Vec::with_capacity(BLOOM_LEVELS);
        let mut vertical_views = Vec::with_capacity(BLOOM_LEVELS);
        for level in 0..BLOOM_LEVELS {
            let (w, h) = level_extent(width, height, level);
            horizontal_views.push(color_target(device, "blur horizontal target", w, h));
            vertical_views.push(color_target(device, "blur vertical target", w, h));
        }

        let bright_group = filter_group(
            device,
            &chain.filter_layout,
            &extract_view,
            &chain.sampler,
            &chain.bright_params,
        );
        // Level 0 blurs the bright target; each later level blurs the
        // previous level's vertical output.
        let mut blur_groups = Vec::with_capacity(BLOOM_LEVELS * 2);
        for level in 0..BLOOM_LEVELS {
            let source = if level == 0 {
                &bright_view
            } else {
                &vertical_views[level - 1]
            };
            blur_groups.push(filter_group(
                device,
                &chain.filter_layout,
                source,
                &chain.sampler,
                &chain.blur_params[level * 2],
            ));
            blur_groups.push(filter_group(
                device,
                &chain.filter_layout,
                &horizontal_views[level],
                &chain.sampler,
                &chain.blur_params[level * 2 + 1],
            ));
        }

        let composite_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite bind group"),
            layout: &chain.composite_layout,
            entries: &[
                texture_binding(0, &vertical_views[0]),
                texture_binding(1, &vertical_views[1]),
                texture_binding(2, &vertical_views[2]),
                texture_binding(3, &vertical_views[3]),
                texture_binding(4, &vertical_views[4]),
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&chain.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: chain.composite_params.as_entire_binding(),
                },
            ],
        });
        let output_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("output bind group"),
            layout: &chain.output_layout,
            entries: &[
                texture_binding(0, &base_view),
                texture_binding(1, &bloom_view),
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&chain.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: chain.output_params.as_entire_binding(),
                },
            ],
        });

        Self {
            extract_view,
            base_view,
            depth_view,
            bright_view,
            horizontal_views,
            vertical_views,
            bloom_view,
            bright_group,
            blur_groups,
            composite_group,
            output_group,
        }
    }
}

fn color_target(device: &wgpu::Device, label: &str, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn depth_target(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn filter_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    source: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    params: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("filter bind group"),
        layout,
        entries: &[
            texture_binding(0, source),
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: params.as_entire_binding(),
            },
        ],
    })
}

fn texture_binding(binding: u32, view: &wgpu::TextureView) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(view),
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_extents_halve_with_rounding() {
        assert_eq!(level_extent(1920, 1080, 0), (960, 540));
        assert_eq!(level_extent(1920, 1080, 1), (480, 270));
        assert_eq!(level_extent(1920, 1080, 4), (60, 34));
    }

    #[test]
    fn odd_extents_round_up() {
        assert_eq!(level_extent(5, 3, 0), (3, 2));
    }

    #[test]
    fn tiny_surfaces_never_reach_zero() {
        assert_eq!(level_extent(1, 1, 4), (1, 1));
        assert_eq!(level_extent(0, 0, 0), (1, 1));
    }

    #[test]
    fn schedule_alternates_direction_per_level() {
        let schedule = blur_schedule(1024, 512);
        assert_eq!(schedule.len(), BLOOM_LEVELS * 2);
        for pair in schedule.chunks(2) {
            assert_eq!(pair[0].direction, [1.0, 0.0]);
            assert_eq!(pair[1].direction, [0.0, 1.0]);
            assert_eq!(pair[0].inv_size, pair[1].inv_size);
        }
    }

    #[test]
    fn schedule_radii_follow_the_kernel_table() {
        let schedule = blur_schedule(800, 600);
        for (level, &radius) in BLUR_KERNEL_RADII.iter().enumerate() {
            assert_eq!(schedule[level * 2].radius, radius as f32);
            assert_eq!(schedule[level * 2].sigma, radius as f32);
        }
    }

    #[test]
    fn schedule_offsets_match_level_extents() {
        let schedule = blur_schedule(640, 480);
        let (w, h) = level_extent(640, 480, 2);
        assert_eq!(schedule[4].inv_size, [1.0 / w as f32, 1.0 / h as f32]);
    }
}
